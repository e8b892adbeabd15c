// Driver matching fan-out for newly opened freights

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::{
    Freight, NotificationKind, NotificationPriority, NotificationRequest, UserRole,
};
use crate::services::notification::NotificationService;
use crate::utils::ServiceError;

/// Upper bound on one fan-out pass
const MAX_MATCH_FANOUT: i64 = 100;

/// Fixed template sent to every matched driver
pub fn build_match_request(driver_id: Uuid, freight: &Freight) -> NotificationRequest {
    NotificationRequest::new(
        driver_id,
        "Carga compatível!",
        format!("Nova carga de {} disponível.", freight.product),
    )
    .kind(NotificationKind::Match)
    .priority(NotificationPriority::High)
    .action_url(format!("/freight/details/{}", freight.slug))
}

pub struct MatchingService {
    pool: DieselPool,
    notifier: Arc<NotificationService>,
}

impl MatchingService {
    pub fn new(pool: DieselPool, notifier: Arc<NotificationService>) -> Self {
        Self { pool, notifier }
    }

    /// Notify drivers whose equipment matches the freight, or whose preferred
    /// region is its origin state. Sequential and best-effort: one driver
    /// failing never blocks the rest, and no transaction wraps the loop.
    /// Returns how many drivers were actually notified.
    #[instrument(skip(self, freight), fields(freight_id = %freight.id))]
    pub async fn trigger_matches(&self, freight: &Freight) -> Result<usize, ServiceError> {
        use crate::schema::users::dsl;

        let mut conn = self.pool.get().await?;

        let driver_ids: Vec<Uuid> = dsl::users
            .filter(dsl::role.eq(UserRole::Driver.as_str()))
            .filter(dsl::deleted_at.is_null())
            .filter(
                dsl::vehicle_type
                    .eq(&freight.vehicle_type)
                    .and(dsl::body_type.eq(&freight.body_type))
                    .or(dsl::preferred_region.eq(&freight.origin_state)),
            )
            .select(dsl::id)
            .limit(MAX_MATCH_FANOUT)
            .load(&mut conn)
            .await?;

        // Release the connection before the fan-out starts doing HTTP calls
        drop(conn);

        let candidates = driver_ids.len();
        let mut notified = 0usize;

        for driver_id in driver_ids {
            match self.notifier.send(build_match_request(driver_id, freight)).await {
                Ok(_) => notified += 1,
                Err(e) => warn!("Match notification to {} failed: {}", driver_id, e),
            }
        }

        info!(
            "Matching fan-out for freight {} notified {} of {} candidate drivers",
            freight.id, notified, candidates
        );

        Ok(notified)
    }
}

// =============================================================================
// TESTS
// =============================================================================
