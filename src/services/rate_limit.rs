// Redis-backed sliding window rate limiting

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::db::RedisPool;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// Sliding window rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the time window
    pub max_requests: u32,

    /// Time window in seconds
    pub window_seconds: u32,

    /// Block duration in seconds when limit is exceeded
    pub block_duration: u32,
}

impl RateLimitConfig {
    /// Freight publication: one listing per minute per account
    pub fn freight_creation() -> Self {
        Self {
            max_requests: 1,
            window_seconds: 60,
            block_duration: 60,
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Remaining requests in current window
    pub remaining: u32,

    /// Window reset time (Unix timestamp)
    pub reset_time: u64,

    /// Retry after seconds (if blocked)
    pub retry_after: Option<u32>,

    /// Current request count in window
    pub current_count: u32,
}

// =============================================================================
// RATE LIMITING SERVICE
// =============================================================================

/// Rate limiting service with atomic Redis operations
pub struct RateLimitService {
    redis_pool: RedisPool,
}

impl RateLimitService {
    /// Create new rate limiting service with Redis backend
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    /// Check the freight publication limit for one account
    #[instrument(skip(self))]
    pub async fn check_freight_creation(
        &self,
        user_id: &str,
    ) -> Result<RateLimitResult, RateLimitError> {
        let start_time = std::time::Instant::now();

        let key = format!("freight_create:{}", user_id);
        let result = self
            .sliding_window_check(&key, &RateLimitConfig::freight_creation())
            .await?;

        let latency_ms = start_time.elapsed().as_millis() as u64;
        if latency_ms > 5 {
            warn!(
                "Rate limit check exceeded 5ms target: {}ms for key: {}",
                latency_ms, key
            );
        }

        Ok(result)
    }

    /// Atomic sliding window rate limiting using a Lua script
    async fn sliding_window_check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut conn = self.redis_pool.get_connection().await?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RateLimitError::Config(format!("System clock error: {}", e)))?
            .as_millis() as u64;

        let window_start = now - (config.window_seconds as u64 * 1000);
        let window_key = format!("rate_limit:{}", key);

        // Atomic Lua script for the sliding window
        let script = r#"
            local key = KEYS[1]
            local now = tonumber(ARGV[1])
            local window_start = tonumber(ARGV[2])
            local max_requests = tonumber(ARGV[3])
            local window_seconds = tonumber(ARGV[4])
            local block_duration = tonumber(ARGV[5])

            -- Remove old entries outside the sliding window
            redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)

            -- Count current requests in window
            local current_count = redis.call('ZCARD', key)

            -- Check if currently blocked
            local block_key = key .. ':blocked'
            local is_blocked = redis.call('EXISTS', block_key)

            if is_blocked == 1 then
                local block_ttl = redis.call('TTL', block_key)
                return {0, 0, now + (window_seconds * 1000), block_ttl > 0 and block_ttl or block_duration, current_count}
            end

            local allowed = current_count < max_requests

            if allowed then
                -- Add current request with unique identifier using timestamp and random number
                local rand = math.random(1000000)
                local request_id = now .. ':' .. rand
                redis.call('ZADD', key, now, request_id)
                current_count = current_count + 1

                -- Set window expiration for key using millisecond precision
                local expire_at = now + (window_seconds * 1000)
                redis.call('PEXPIREAT', key, expire_at)
            else
                -- Block the key for block_duration
                redis.call('SETEX', block_key, block_duration, '1')
            end

            local remaining = math.max(0, max_requests - current_count)
            local reset_time = now + (window_seconds * 1000)
            local retry_after = allowed and 0 or block_duration

            return {allowed and 1 or 0, remaining, reset_time, retry_after, current_count}
        "#;

        let result: Vec<u64> = redis::Script::new(script)
            .key(&window_key)
            .arg(now)
            .arg(window_start)
            .arg(config.max_requests)
            .arg(config.window_seconds)
            .arg(config.block_duration)
            .invoke_async(&mut conn)
            .await?;

        // Parse Lua script result
        let allowed = result[0] == 1;
        let remaining = result[1] as u32;
        let reset_time = result[2] / 1000; // Convert milliseconds back to seconds for API
        let retry_after = if result[3] > 0 {
            Some(result[3] as u32)
        } else {
            None
        };
        let current_count = result[4] as u32;

        Ok(RateLimitResult {
            allowed,
            remaining,
            reset_time,
            retry_after,
            current_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freight_creation_config() {
        let config = RateLimitConfig::freight_creation();
        assert_eq!(config.max_requests, 1);
        assert_eq!(config.window_seconds, 60);
        assert_eq!(config.block_duration, 60);
    }
}
