// Library exports for the ChamaFrete backend core
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use config::{Action, PolicyTable, PricingConfig};
pub use db::{DieselDatabaseConfig, DieselPool, RedisConfig, RedisPool};
pub use middleware::auth_middleware;
pub use middleware::{AuthenticatedUser, OptionalUser};
pub use services::{
    AdService, CreditService, FreightService, MatchingService, NotificationService,
    RateLimitResult, RateLimitService, SlugGenerator, VerificationService,
};
pub use utils::service_error::ServiceError;

// Re-export handler route builders
pub use handlers::{
    ad_routes, admin_routes, credit_routes, docs_routes, freight_routes, notification_routes,
};

// Library initialization function for external consumers
// Builds the shared state every route group hangs off
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tracing::{info, warn};

    // Load environment
    dotenv::dotenv().ok();

    // Initialize config
    let config = app_config::config();

    // Initialize database pool
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    // Run migrations if enabled
    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(&diesel_pool)
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    // Initialize Redis pool
    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await?;

    // Initialize services
    let rate_limit_service = Arc::new(services::RateLimitService::new(redis_pool.clone()));

    let telegram = if config.notifications.telegram_enabled() {
        Some(services::TelegramChannel::new(
            config.notifications.telegram_bot_token.clone(),
            config.notifications.telegram_chat_id.clone(),
        ))
    } else {
        None
    };
    let push = if config.notifications.push_enabled() {
        Some(services::PushChannel::new(
            config.notifications.push_api_url.clone(),
            config.notifications.push_api_key.clone(),
        ))
    } else {
        None
    };
    let notification_service = Arc::new(services::NotificationService::with_channels(
        diesel_pool.clone(),
        telegram,
        push,
    ));

    // Load the pricing snapshot. A missing settings table is not fatal;
    // defaults apply until an admin saves pricing.
    let pricing = match diesel_pool.get().await {
        Ok(mut conn) => match PricingConfig::load(&mut conn).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load pricing from site_settings: {}", e);
                PricingConfig::default()
            },
        },
        Err(e) => {
            warn!("Failed to get connection for pricing load: {}", e);
            PricingConfig::default()
        },
    };
    info!("Pricing snapshot: {:?}", pricing);

    // Create app state
    Ok(AppState {
        diesel_pool,
        redis_pool,
        rate_limit_service,
        notification_service,
        pricing: Arc::new(RwLock::new(pricing)),
    })
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    // Check PostgreSQL
    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    // Check Redis
    let redis_health_result = state.redis_pool.health_check().await;
    if !redis_health_result.is_healthy {
        overall_healthy = false;
    }

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "chamafrete-backend-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": serde_json::json!({
                "status": if redis_health_result.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health_result.latency_ms,
                "error": redis_health_result.error
            })
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
