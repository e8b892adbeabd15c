// Verification badge scoring and cached reputation sync

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::{NotificationKind, NotificationRequest, ReviewStatus, User};
use crate::services::notification::NotificationService;
use crate::utils::{AuditAction, AuditLogger, ServiceError};

// =============================================================================
// SCORING RULES
// =============================================================================

/// Points granted per completed profile field
const POINTS_PER_FIELD: i32 = 20;
/// Point total that earns the badge outright
const BADGE_POINT_THRESHOLD: i32 = 80;
/// Alternative path: a track record of well-rated work
const BADGE_RATING_COUNT: i32 = 5;
const BADGE_RATING_AVG: f64 = 4.5;

/// Profile completeness score. Name always exists but may be blank after
/// trimming, so it is checked like the optional fields.
pub fn profile_points(user: &User) -> i32 {
    let filled = [
        !user.name.trim().is_empty(),
        field_filled(&user.whatsapp),
        field_filled(&user.avatar_url),
        field_filled(&user.city),
        field_filled(&user.bio),
    ];

    filled.iter().filter(|f| **f).count() as i32 * POINTS_PER_FIELD
}

fn field_filled(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Badge rule: complete profile, or enough well-rated finished work
pub fn earns_badge(points: i32, rating_count: i32, rating_avg: f64) -> bool {
    points >= BADGE_POINT_THRESHOLD
        || (rating_count >= BADGE_RATING_COUNT && rating_avg >= BADGE_RATING_AVG)
}

/// Average and count over published review ratings
pub fn summarize_ratings(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    (sum as f64 / ratings.len() as f64, ratings.len() as i32)
}

// =============================================================================
// VERIFICATION SERVICE
// =============================================================================

pub struct VerificationService {
    pool: DieselPool,
    notifier: Arc<NotificationService>,
}

impl VerificationService {
    pub fn new(pool: DieselPool, notifier: Arc<NotificationService>) -> Self {
        Self { pool, notifier }
    }

    /// Recompute the derived badge for one user and persist it when it
    /// changed. A newly earned badge fires a congratulation notification.
    /// Returns the badge state after the run.
    #[instrument(skip(self))]
    pub async fn run_verification(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        use crate::schema::users::dsl;

        let mut conn = self.pool.get().await?;
        let user = User::find_by_id(&mut conn, user_id).await?;

        let points = profile_points(&user);
        let badge = earns_badge(points, user.rating_count, user.rating_avg);

        if badge != user.is_verified {
            diesel::update(dsl::users.filter(dsl::id.eq(user_id)))
                .set(dsl::is_verified.eq(badge))
                .execute(&mut conn)
                .await?;

            info!(
                "Verification badge for {} now {} ({} points, {} ratings avg {:.2})",
                user_id, badge, points, user.rating_count, user.rating_avg
            );

            if badge {
                let request = NotificationRequest::new(
                    user_id,
                    "Perfil Verificado!",
                    "Seu perfil agora exibe o selo de verificação.",
                )
                .kind(NotificationKind::Verification);

                if let Err(e) = self.notifier.send(request).await {
                    warn!("Badge notification for {} failed: {}", user_id, e);
                }
            }
        }

        Ok(badge)
    }

    /// Recompute rating_avg/rating_count from published reviews targeting
    /// the user, cache them on the user row, then re-run the badge rules
    /// so the fresh rating can flip the badge.
    #[instrument(skip(self))]
    pub async fn refresh_reputation(&self, user_id: Uuid) -> Result<(), ServiceError> {
        use crate::schema::reviews::dsl as r;
        use crate::schema::users::dsl as u;

        let mut conn = self.pool.get().await?;

        let ratings: Vec<i32> = r::reviews
            .filter(r::target_id.eq(user_id))
            .filter(r::status.eq(ReviewStatus::Published.as_str()))
            .select(r::rating)
            .load(&mut conn)
            .await?;

        let (avg, count) = summarize_ratings(&ratings);

        diesel::update(u::users.filter(u::id.eq(user_id)))
            .set((u::rating_avg.eq(avg), u::rating_count.eq(count)))
            .execute(&mut conn)
            .await?;

        drop(conn);
        self.run_verification(user_id).await?;
        Ok(())
    }

    /// Manual override, bypasses the point system entirely
    #[instrument(skip(self))]
    pub async fn admin_set_verified(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        flag: bool,
    ) -> Result<(), ServiceError> {
        use crate::schema::users::dsl;

        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            dsl::users
                .filter(dsl::id.eq(user_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set(dsl::is_verified.eq(flag))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            return Err(ServiceError::NotFound);
        }

        AuditLogger::log_user_action(
            AuditAction::UserVerificationChanged,
            admin_id,
            user_id,
            Some(format!("{{\"is_verified\": {}}}", flag)),
        );

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn blank_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "".to_string(),
            email: "driver@example.com".to_string(),
            whatsapp: None,
            role: "driver".to_string(),
            document_status: "approved".to_string(),
            is_verified: false,
            rating_avg: 0.0,
            rating_count: 0,
            balance: 0,
            avatar_url: None,
            city: None,
            bio: None,
            vehicle_type: None,
            body_type: None,
            preferred_region: None,
            push_token: None,
            profile_slug: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn points_accumulate_per_field() {
        let mut user = blank_user();
        assert_eq!(profile_points(&user), 0);

        user.name = "Ana Transportes".to_string();
        user.whatsapp = Some("41999990000".to_string());
        assert_eq!(profile_points(&user), 40);

        user.avatar_url = Some("https://cdn.example.com/a.png".to_string());
        user.city = Some("Curitiba".to_string());
        user.bio = Some("15 anos na estrada".to_string());
        assert_eq!(profile_points(&user), 100);
    }

    #[test]
    fn blank_strings_do_not_score() {
        let mut user = blank_user();
        user.whatsapp = Some("   ".to_string());
        user.city = Some("".to_string());
        assert_eq!(profile_points(&user), 0);
    }

    #[test]
    fn badge_by_points_or_rating() {
        assert!(earns_badge(80, 0, 0.0));
        assert!(!earns_badge(60, 0, 0.0));
        assert!(earns_badge(0, 5, 4.5));
        assert!(!earns_badge(0, 4, 5.0));
        assert!(!earns_badge(0, 10, 4.4));
    }

    #[test]
    fn rating_summary() {
        assert_eq!(summarize_ratings(&[]), (0.0, 0));
        assert_eq!(summarize_ratings(&[5, 4, 5]), (14.0 / 3.0, 3));
        assert_eq!(summarize_ratings(&[3]), (3.0, 1));
    }
}
