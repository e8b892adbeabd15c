// Application state and configuration
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    config::PricingConfig,
    db::DieselPool,
    services::{NotificationService, RateLimitService},
    RedisPool,
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub rate_limit_service: Arc<RateLimitService>,
    pub notification_service: Arc<NotificationService>,
    /// Ad billing costs, snapshotted from site_settings; admins refresh it
    /// through the settings endpoint
    pub pricing: Arc<RwLock<PricingConfig>>,
}
