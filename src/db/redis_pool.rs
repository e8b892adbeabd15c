// Redis connection pool over ConnectionManager instances

use rand::{thread_rng, Rng};
use redis::{aio::ConnectionManager, Client, RedisError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use super::redis_config::RedisConfig;

/// Maximum delay cap for exponential backoff
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Timeout for connection validation checks
const VALIDATION_TIMEOUT: Duration = Duration::from_millis(100);

/// Redis connection pool manager
pub struct RedisPool {
    connections: Arc<RwLock<Vec<ConnectionManager>>>,
    client: Client,
    config: RedisConfig,
    active_count: Arc<AtomicUsize>,
}

/// Health check status for Redis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisHealth {
    pub is_healthy: bool,
    pub latency_ms: u64,
    pub active_connections: u32,
    pub total_connections: u32,
    pub error: Option<String>,
}

impl RedisPool {
    /// Create a new Redis connection pool with retry logic
    #[instrument(skip(config))]
    pub async fn new(config: RedisConfig) -> Result<Self, RedisError> {
        config.validate().map_err(|e| {
            error!("Invalid Redis configuration: {}", e);
            RedisError::from((
                redis::ErrorKind::InvalidClientConfig,
                "Invalid configuration",
            ))
        })?;

        info!(
            "Initializing Redis pool ({}), size {}",
            mask_redis_url(&config.redis_url),
            config.pool_size
        );

        let client = Client::open(config.redis_url.as_str())?;

        let pool = Self {
            connections: Arc::new(RwLock::new(Vec::new())),
            client,
            config,
            active_count: Arc::new(AtomicUsize::new(0)),
        };

        pool.initialize_pool().await?;

        Ok(pool)
    }

    async fn initialize_pool(&self) -> Result<(), RedisError> {
        let mut connections = Vec::new();

        for i in 0..self.config.pool_size {
            match self.create_connection_with_retry().await {
                Ok(conn) => connections.push(conn),
                Err(e) => {
                    warn!("Failed to create Redis connection {}: {}", i, e);
                    // At least one connection must come up or startup fails
                    if connections.is_empty() {
                        return Err(e);
                    }
                },
            }
        }

        info!("Redis pool initialized with {} connections", connections.len());
        let mut pool = self.connections.write().await;
        *pool = connections;
        Ok(())
    }

    /// Create a connection with exponential backoff and jitter
    async fn create_connection_with_retry(&self) -> Result<ConnectionManager, RedisError> {
        let mut retry_count = 0;
        let mut delay = self.config.retry_delay;

        loop {
            match ConnectionManager::new(self.client.clone()).await {
                Ok(conn) => return Ok(conn),
                Err(e) if retry_count < self.config.retry_attempts => {
                    warn!(
                        "Failed to create Redis connection (attempt {}/{}): {}",
                        retry_count + 1,
                        self.config.retry_attempts,
                        e
                    );

                    sleep(delay).await;

                    let jitter = thread_rng().gen_range(0..100);
                    delay =
                        std::cmp::min(delay * 2 + Duration::from_millis(jitter), MAX_RETRY_DELAY);
                    retry_count += 1;
                },
                Err(e) => {
                    error!(
                        "Failed to create Redis connection after {} attempts",
                        self.config.retry_attempts
                    );
                    return Err(e);
                },
            }
        }
    }

    /// Get a connection from the pool. When the pool is empty a temporary
    /// connection is created, capped at twice the configured pool size.
    pub async fn get_connection(&self) -> Result<ConnectionManager, RedisError> {
        let max_allowed = (self.config.pool_size * 2) as usize;

        {
            let mut pool = self.connections.write().await;
            if let Some(conn) = pool.pop() {
                self.active_count.fetch_add(1, Ordering::Relaxed);
                return Ok(conn);
            }
        }

        let current_active = self.active_count.load(Ordering::Relaxed);
        if current_active >= max_allowed {
            error!(
                "Redis connection limit reached: {}/{} connections active",
                current_active, max_allowed
            );
            return Err(RedisError::from((
                redis::ErrorKind::BusyLoadingError,
                "Connection pool exhausted and limit reached",
            )));
        }

        warn!(
            "Redis pool exhausted ({}/{} active), creating temporary connection",
            current_active, self.config.pool_size
        );
        let conn = self.create_connection_with_retry().await?;
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    /// Return a connection to the pool
    pub async fn return_connection(&self, mut conn: ConnectionManager) {
        if let Err(e) = self.validate_connection(&mut conn).await {
            warn!("Not returning unhealthy connection to pool: {}", e);
            self.active_count.fetch_sub(1, Ordering::Relaxed);
            return;
        }

        let mut pool = self.connections.write().await;
        if pool.len() < self.config.pool_size as usize {
            pool.push(conn);
        }
        // Above pool size the connection drops, either way it is no longer active
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Lightweight PING check with timeout
    async fn validate_connection(&self, conn: &mut ConnectionManager) -> Result<(), RedisError> {
        match tokio::time::timeout(
            VALIDATION_TIMEOUT,
            redis::cmd("PING").query_async::<String>(conn),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RedisError::from((
                redis::ErrorKind::IoError,
                "Connection validation timeout",
            ))),
        }
    }

    /// Execute a command with automatic connection management
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T, RedisError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = Result<(T, ConnectionManager), RedisError>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok((result, conn)) => {
                self.return_connection(conn).await;
                Ok(result)
            },
            Err(e) => {
                // Failed connections are not returned to the pool
                error!("Redis command failed: {}", e);
                self.active_count.fetch_sub(1, Ordering::Relaxed);
                Err(e)
            },
        }
    }

    /// Perform a health check on Redis
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> RedisHealth {
        let start = Instant::now();

        match self
            .execute(|mut conn| async move {
                let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok((pong, conn))
            })
            .await
        {
            Ok(_) => {
                let latency = start.elapsed();
                let pool = self.connections.read().await;
                let active = self.active_count.load(Ordering::Relaxed);

                RedisHealth {
                    is_healthy: true,
                    latency_ms: latency.as_millis() as u64,
                    active_connections: active as u32,
                    total_connections: pool.len() as u32,
                    error: None,
                }
            },
            Err(e) => {
                error!("Redis health check failed: {}", e);
                RedisHealth {
                    is_healthy: false,
                    latency_ms: start.elapsed().as_millis() as u64,
                    active_connections: 0,
                    total_connections: 0,
                    error: Some(e.to_string()),
                }
            },
        }
    }
}

impl Clone for RedisPool {
    fn clone(&self) -> Self {
        Self {
            connections: self.connections.clone(),
            client: self.client.clone(),
            config: self.config.clone(),
            active_count: self.active_count.clone(),
        }
    }
}

/// Mask Redis URL for logging
fn mask_redis_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let host = parsed.host_str().unwrap_or("***");
        let port = parsed.port().unwrap_or(6379);

        if !parsed.username().is_empty() || parsed.password().is_some() {
            format!("redis://***:***@{}:{}", host, port)
        } else {
            format!("redis://{}:{}", host, port)
        }
    } else {
        "redis://***:***@***:***".to_string()
    }
}
