// Ad serving and billing: geographic ranking with a credit boost, guarded
// per-event debits against the owner balance, and auto-pause on depletion.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::config::{Action, PolicyTable, PricingConfig};
use crate::db::DieselPool;
use crate::middleware::AuthenticatedUser;
use crate::models::ad::{
    Ad, AdChangeset, AdPerformancePoint, AdPlacement, AdReportResponse, AdServeQuery,
    AdServeResponse, AdStatus, NewAd, UpsertAdRequest,
};
use crate::models::click_log::{EventType, NewClickLog, TargetType};
use crate::models::credit::NewCreditTransaction;
use crate::utils::audit_logger::{AuditAction, AuditLogger};
use crate::utils::service_error::ServiceError;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Platform-wide ads serve everywhere and ride along on every search
const PLATFORM_CATEGORY: &str = "PLATAFORMA";

const CITY_MATCH_SCORE: i32 = 100;
const STATE_MATCH_SCORE: i32 = 50;
const BASE_SCORE: i32 = 10;
const MISLOCATED_SCORE: i32 = 1;
/// Owners with credits left outrank any pure geography match
const BALANCE_BOOST: i32 = 200;

const DEFAULT_SERVE_LIMIT: i64 = 2;
const MAX_SERVE_LIMIT: i64 = 10;
/// Below this many served ads the client falls back to house banners
const FALLBACK_THRESHOLD: usize = 2;

const REPORT_WINDOW_DAYS: i64 = 30;

// =============================================================================
// RANKING
// =============================================================================

#[derive(Debug)]
struct ScoredAd {
    ad: Ad,
    score: i32,
}

fn location_matches(requested: Option<&str>, ad_value: &str) -> bool {
    match requested {
        Some(value) => {
            !ad_value.is_empty() && value.trim().to_lowercase() == ad_value.to_lowercase()
        },
        None => false,
    }
}

/// Geographic component of the priority score. Platform-wide and unlocated
/// ads serve everywhere at base priority; a located ad that matches neither
/// requested axis is effectively invisible but never excluded.
fn geo_score(ad: &Ad, state: Option<&str>, city: Option<&str>) -> i32 {
    if ad.category.eq_ignore_ascii_case(PLATFORM_CATEGORY) {
        return BASE_SCORE;
    }

    let ad_city = ad.location_city.trim();
    let ad_state = ad.location_state.trim();
    if ad_city.is_empty() && ad_state.is_empty() {
        return BASE_SCORE;
    }

    if location_matches(city, ad_city) {
        CITY_MATCH_SCORE
    } else if location_matches(state, ad_state) {
        STATE_MATCH_SCORE
    } else if city.is_some() || state.is_some() {
        MISLOCATED_SCORE
    } else {
        BASE_SCORE
    }
}

fn priority_score(ad: &Ad, state: Option<&str>, city: Option<&str>, owner_balance: i64) -> i32 {
    let boost = if owner_balance > 0 { BALANCE_BOOST } else { 0 };
    geo_score(ad, state, city) + boost
}

/// Order by score descending. The pre-sort shuffle combined with a stable
/// sort rotates ads fairly among equal scores.
fn rank(mut scored: Vec<ScoredAd>, limit: usize) -> Vec<ScoredAd> {
    let mut rng = rand::thread_rng();
    scored.shuffle(&mut rng);
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

// =============================================================================
// AD SERVICE
// =============================================================================

pub struct AdService {
    pool: DieselPool,
    pricing: Arc<RwLock<PricingConfig>>,
}

impl AdService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.diesel_pool.clone(),
            pricing: state.pricing.clone(),
        }
    }

    /// Serve ranked ads for a placement slot
    #[instrument(skip(self, query))]
    pub async fn find(&self, query: AdServeQuery) -> Result<AdServeResponse, ServiceError> {
        use crate::schema::ads::dsl;
        use crate::schema::users::dsl as u;

        let limit = query
            .limit
            .unwrap_or(DEFAULT_SERVE_LIMIT)
            .clamp(1, MAX_SERVE_LIMIT) as usize;

        let mut conn = self.pool.get().await?;

        let now = Utc::now();
        let mut eligible = dsl::ads
            .filter(dsl::is_deleted.eq(false))
            .filter(dsl::status.eq(AdStatus::Active.as_str()))
            .filter(dsl::expires_at.is_null().or(dsl::expires_at.ge(now)))
            .into_boxed();

        if let Some(ref position) = query.position {
            if !position.is_empty() {
                eligible = eligible.filter(dsl::position.eq(position.clone()));
            }
        }

        if let Some(ref term) = query.search {
            let term = term.trim();
            if !term.is_empty() {
                let pattern = format!("%{}%", term);
                eligible = eligible.filter(
                    dsl::title
                        .ilike(pattern.clone())
                        .or(dsl::category.ilike(pattern.clone()))
                        .or(dsl::description.ilike(pattern))
                        .or(dsl::category.eq(PLATFORM_CATEGORY)),
                );
            }
        }

        let ads: Vec<Ad> = eligible.load::<Ad>(&mut conn).await?;

        if ads.is_empty() {
            return Ok(AdServeResponse {
                success: true,
                data: Vec::new(),
                show_fallback: true,
            });
        }

        // Owner balances drive the credit boost
        let owner_ids: Vec<Uuid> = ads.iter().map(|ad| ad.user_id).collect();
        let balances: Vec<(Uuid, i64)> = u::users
            .filter(u::id.eq_any(&owner_ids))
            .select((u::id, u::balance))
            .load(&mut conn)
            .await?;
        let balance_by_owner: HashMap<Uuid, i64> = balances.into_iter().collect();

        let scored: Vec<ScoredAd> = ads
            .into_iter()
            .map(|ad| {
                let balance = balance_by_owner.get(&ad.user_id).copied().unwrap_or(0);
                let score =
                    priority_score(&ad, query.state.as_deref(), query.city.as_deref(), balance);
                ScoredAd { ad, score }
            })
            .collect();

        let ranked = rank(scored, limit);
        let data: Vec<AdPlacement> = ranked.iter().map(|s| AdPlacement::from(&s.ad)).collect();
        let show_fallback = data.len() < FALLBACK_THRESHOLD;

        Ok(AdServeResponse {
            success: true,
            data,
            show_fallback,
        })
    }

    /// Batch impression billing for a served page. One transaction covers
    /// the whole batch: counters, VIEW event rows, and one guarded debit per
    /// ad. Owners who run dry get their ad paused in the same pass.
    #[instrument(skip(self))]
    pub async fn record_impressions(&self, ad_ids: Vec<Uuid>) -> Result<(), ServiceError> {
        use crate::schema::ads::dsl;

        if ad_ids.is_empty() {
            return Ok(());
        }

        let pricing = *self.pricing.read().await;
        let view_cost = pricing.view_cost;

        let mut conn = self.pool.get().await?;
        let paused = conn
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    let mut paused: Vec<(Uuid, Uuid)> = Vec::new();

                    for ad_id in ad_ids {
                        // Unknown ids in the batch are skipped, not fatal
                        let ad: Option<Ad> = dsl::ads
                            .filter(dsl::id.eq(ad_id))
                            .filter(dsl::is_deleted.eq(false))
                            .first(conn)
                            .await
                            .optional()?;
                        let ad = match ad {
                            Some(ad) => ad,
                            None => continue,
                        };

                        diesel::update(dsl::ads.filter(dsl::id.eq(ad_id)))
                            .set(dsl::views_count.eq(dsl::views_count + 1))
                            .execute(conn)
                            .await?;

                        let row = NewClickLog::new(None, ad_id, TargetType::Ad, EventType::View);
                        diesel::insert_into(crate::schema::click_logs::table)
                            .values(&row)
                            .execute(conn)
                            .await?;

                        if view_cost > 0 && !Self::debit_or_pause(conn, &ad, view_cost, EventType::View).await? {
                            paused.push((ad.user_id, ad.id));
                        }
                    }

                    Ok(paused)
                })
            })
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))?;

        for (owner, ad_id) in paused {
            AuditLogger::log_ad_action(
                AuditAction::AdPaused,
                owner,
                Some(ad_id),
                Some("Auto-paused on depleted balance (VIEW)".to_string()),
            );
        }

        Ok(())
    }

    /// Bill a single interaction event. The cost comes from the pricing
    /// snapshot taken before the transaction; counters and the event row
    /// stand even when the debit guard fails.
    #[instrument(skip(self, viewer))]
    pub async fn record_event(
        &self,
        viewer: Option<Uuid>,
        ad_id: Uuid,
        event: EventType,
    ) -> Result<(), ServiceError> {
        use crate::schema::ads::dsl;

        let pricing = *self.pricing.read().await;
        let cost = pricing.cost_for(event);

        let mut conn = self.pool.get().await?;
        let paused = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let ad: Ad = dsl::ads
                        .filter(dsl::id.eq(ad_id))
                        .filter(dsl::is_deleted.eq(false))
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(ServiceError::NotFound)?;

                    if event.is_view_kind() {
                        diesel::update(dsl::ads.filter(dsl::id.eq(ad_id)))
                            .set(dsl::views_count.eq(dsl::views_count + 1))
                            .execute(conn)
                            .await?;
                    } else {
                        diesel::update(dsl::ads.filter(dsl::id.eq(ad_id)))
                            .set(dsl::clicks_count.eq(dsl::clicks_count + 1))
                            .execute(conn)
                            .await?;
                    }

                    let row = NewClickLog::new(viewer, ad_id, TargetType::Ad, event);
                    diesel::insert_into(crate::schema::click_logs::table)
                        .values(&row)
                        .execute(conn)
                        .await?;

                    match cost {
                        Some(cost) if cost > 0 => {
                            let charged =
                                Self::debit_or_pause(conn, &ad, cost, event).await?;
                            Ok(if charged { None } else { Some(ad.user_id) })
                        },
                        _ => Ok(None),
                    }
                })
            })
            .await?;

        if let Some(owner) = paused {
            AuditLogger::log_ad_action(
                AuditAction::AdPaused,
                owner,
                Some(ad_id),
                Some(format!("Auto-paused on depleted balance ({})", event.as_str())),
            );
        }

        Ok(())
    }

    /// Create or update a placement. The request carries an id on update.
    #[instrument(skip(self, principal, request), fields(user_id = %principal.user_id))]
    pub async fn upsert(
        &self,
        principal: &AuthenticatedUser,
        mut request: UpsertAdRequest,
    ) -> Result<Ad, ServiceError> {
        use crate::schema::ads::dsl;

        if !PolicyTable::is_allowed(Action::ManageAds, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only advertisers can manage ad placements".to_string(),
            ));
        }

        request.sanitize();
        request.validate()?;
        request
            .validate_custom()
            .map_err(ServiceError::ValidationError)?;

        let mut conn = self.pool.get().await?;

        match request.id {
            Some(ad_id) => {
                let existing: Ad = dsl::ads
                    .filter(dsl::id.eq(ad_id))
                    .filter(dsl::is_deleted.eq(false))
                    .first(&mut conn)
                    .await
                    .optional()?
                    .ok_or(ServiceError::NotFound)?;

                if existing.user_id != principal.user_id && !principal.is_admin() {
                    return Err(ServiceError::Forbidden(
                        "Not the owner of this ad".to_string(),
                    ));
                }

                let changeset = AdChangeset {
                    title: Some(request.title),
                    category: Some(request.category),
                    description: Some(request.description),
                    destination_url: Some(request.destination_url),
                    image_url: Some(request.image_url),
                    location_city: Some(request.location_city),
                    location_state: Some(request.location_state),
                    position: Some(request.position),
                    status: None,
                    expires_at: Some(request.expires_at),
                };

                let updated: Ad = diesel::update(dsl::ads.filter(dsl::id.eq(ad_id)))
                    .set((&changeset, dsl::updated_at.eq(Utc::now())))
                    .get_result(&mut conn)
                    .await?;

                AuditLogger::log_ad_action(
                    AuditAction::AdSaved,
                    principal.user_id,
                    Some(ad_id),
                    Some("updated".to_string()),
                );
                Ok(updated)
            },
            None => {
                let new_ad = NewAd {
                    id: Uuid::new_v4(),
                    user_id: principal.user_id,
                    title: request.title,
                    category: request.category,
                    description: request.description,
                    destination_url: request.destination_url,
                    image_url: request.image_url,
                    location_city: request.location_city,
                    location_state: request.location_state,
                    position: request.position,
                    status: AdStatus::Active.as_str().to_string(),
                    expires_at: request.expires_at,
                };

                let created: Ad = diesel::insert_into(dsl::ads)
                    .values(&new_ad)
                    .get_result(&mut conn)
                    .await?;

                info!("Ad {} created by {}", created.id, principal.user_id);
                AuditLogger::log_ad_action(
                    AuditAction::AdSaved,
                    principal.user_id,
                    Some(created.id),
                    Some("created".to_string()),
                );
                Ok(created)
            },
        }
    }

    #[instrument(skip(self, principal))]
    pub async fn soft_delete(
        &self,
        principal: &AuthenticatedUser,
        ad_id: Uuid,
    ) -> Result<(), ServiceError> {
        use crate::schema::ads::dsl;

        if !PolicyTable::is_allowed(Action::ManageAds, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only advertisers can manage ad placements".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;

        let existing: Ad = dsl::ads
            .filter(dsl::id.eq(ad_id))
            .filter(dsl::is_deleted.eq(false))
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound)?;

        if existing.user_id != principal.user_id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Not the owner of this ad".to_string(),
            ));
        }

        let updated = diesel::update(
            dsl::ads
                .filter(dsl::id.eq(ad_id))
                .filter(dsl::is_deleted.eq(false)),
        )
        .set((dsl::is_deleted.eq(true), dsl::updated_at.eq(Utc::now())))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            return Err(ServiceError::NotFound);
        }

        AuditLogger::log_ad_action(AuditAction::AdDeleted, principal.user_id, Some(ad_id), None);
        Ok(())
    }

    /// Daily view/click series over the last 30 days, oldest day first
    #[instrument(skip(self, principal))]
    pub async fn performance_report(
        &self,
        principal: &AuthenticatedUser,
        ad_id: Uuid,
    ) -> Result<AdReportResponse, ServiceError> {
        use crate::schema::ads::dsl;
        use crate::schema::click_logs::dsl as cl;

        let mut conn = self.pool.get().await?;

        let ad: Ad = dsl::ads
            .filter(dsl::id.eq(ad_id))
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound)?;

        if ad.user_id != principal.user_id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Not the owner of this ad".to_string(),
            ));
        }

        let since = Utc::now() - Duration::days(REPORT_WINDOW_DAYS);
        let events: Vec<(String, DateTime<Utc>)> = cl::click_logs
            .filter(cl::target_id.eq(ad_id))
            .filter(cl::target_type.eq(TargetType::Ad.as_str()))
            .filter(cl::created_at.ge(since))
            .select((cl::event_type, cl::created_at))
            .load(&mut conn)
            .await?;

        let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for (event, at) in events {
            let bucket = days.entry(at.date_naive()).or_insert((0, 0));
            match EventType::from_string(&event) {
                Ok(e) if e.is_view_kind() => bucket.0 += 1,
                Ok(_) => bucket.1 += 1,
                Err(_) => {},
            }
        }

        let data = days
            .into_iter()
            .map(|(date, (views, clicks))| AdPerformancePoint { date, views, clicks })
            .collect();

        Ok(AdReportResponse {
            success: true,
            data,
        })
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    /// Guarded debit against the owner balance. A failed guard pauses the
    /// ad and writes no ledger row; the caller audits after commit.
    async fn debit_or_pause(
        conn: &mut AsyncPgConnection,
        ad: &Ad,
        cost: i64,
        event: EventType,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::ads::dsl as a;
        use crate::schema::users::dsl as u;

        let debited = diesel::update(
            u::users
                .filter(u::id.eq(ad.user_id))
                .filter(u::balance.ge(cost)),
        )
        .set(u::balance.eq(u::balance - cost))
        .execute(conn)
        .await?;

        if debited > 0 {
            let row = NewCreditTransaction::consumption(ad.user_id, ad.id, cost, event.as_str());
            diesel::insert_into(crate::schema::credit_transactions::table)
                .values(&row)
                .execute(conn)
                .await?;
            return Ok(true);
        }

        warn!(
            "Insufficient balance: owner {} not charged {} for {} on ad {}",
            ad.user_id,
            cost,
            event.as_str(),
            ad.id
        );
        diesel::update(a::ads.filter(a::id.eq(ad.id)))
            .set((
                a::status.eq(AdStatus::Paused.as_str()),
                a::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located_ad(city: &str, state: &str) -> Ad {
        Ad {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Pneus".into(),
            category: "PECAS".into(),
            description: String::new(),
            destination_url: String::new(),
            image_url: String::new(),
            location_city: city.into(),
            location_state: state.into(),
            position: "home".into(),
            status: "active".into(),
            views_count: 0,
            clicks_count: 0,
            expires_at: None,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn city_match_beats_state_match() {
        let ad = located_ad("Curitiba", "PR");
        assert_eq!(geo_score(&ad, Some("PR"), Some("curitiba")), 100);
        assert_eq!(geo_score(&ad, Some("PR"), Some("Londrina")), 50);
        assert_eq!(geo_score(&ad, Some("SP"), Some("Campinas")), 1);
    }

    #[test]
    fn unlocated_and_platform_ads_score_base() {
        let nationwide = located_ad("", "");
        assert_eq!(geo_score(&nationwide, Some("SP"), Some("Campinas")), 10);

        let mut platform = located_ad("Curitiba", "PR");
        platform.category = "PLATAFORMA".into();
        assert_eq!(geo_score(&platform, Some("SP"), Some("Campinas")), 10);
    }

    #[test]
    fn request_without_location_scores_base_for_located_ads() {
        let ad = located_ad("Curitiba", "PR");
        assert_eq!(geo_score(&ad, None, None), 10);
    }

    #[test]
    fn credit_boost_dominates_geography() {
        let city_ad = located_ad("Curitiba", "PR");
        let state_ad = located_ad("Londrina", "PR");

        let broke_city = priority_score(&city_ad, Some("PR"), Some("Curitiba"), 0);
        let funded_state = priority_score(&state_ad, Some("PR"), Some("Curitiba"), 5);
        assert_eq!(broke_city, 100);
        assert_eq!(funded_state, 250);
        assert!(funded_state > broke_city);
    }

    #[test]
    fn rank_orders_by_score_and_caps_at_limit() {
        let scored = vec![
            ScoredAd { ad: located_ad("A", "AA"), score: 10 },
            ScoredAd { ad: located_ad("B", "BB"), score: 250 },
            ScoredAd { ad: located_ad("C", "CC"), score: 100 },
            ScoredAd { ad: located_ad("D", "DD"), score: 50 },
        ];

        let ranked = rank(scored, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].score, 250);
        assert_eq!(ranked[1].score, 100);
        assert_eq!(ranked[2].score, 50);
    }

    #[test]
    fn rank_keeps_every_ad_when_under_limit() {
        let scored = vec![
            ScoredAd { ad: located_ad("A", "AA"), score: 10 },
            ScoredAd { ad: located_ad("B", "BB"), score: 10 },
        ];
        let ranked = rank(scored, 5);
        assert_eq!(ranked.len(), 2);
    }
}
