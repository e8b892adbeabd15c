// Freight lifecycle engine: creation gates, the status state machine,
// public listing queries, interaction logging, and admin moderation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::config::{Action, PolicyTable};
use crate::db::DieselPool;
use crate::middleware::AuthenticatedUser;
use crate::models::click_log::{EventType, NewClickLog, TargetType};
use crate::models::freight::{
    CreateFreightRequest, CreateFreightResponse, Freight, FreightChangeset, FreightDetailResponse,
    FreightListItem, FreightListQuery, FreightListResponse, FreightStatus, LeadItem,
    MyFreightsResponse, NewFreight, OwnerStats, PaymentStatus, UpdateFreightRequest,
};
use crate::models::notification::{NotificationKind, NotificationPriority, NotificationRequest};
use crate::models::user::{User, UserRole};
use crate::services::matching::MatchingService;
use crate::services::notification::NotificationService;
use crate::services::rate_limit::RateLimitService;
use crate::services::slug::SlugGenerator;
use crate::services::verification::VerificationService;
use crate::utils::audit_logger::{AuditAction, AuditLogger};
use crate::utils::content_filter;
use crate::utils::service_error::ServiceError;

// =============================================================================
// CONSTANTS
// =============================================================================

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 50;

/// Listing lifetime in days; featured listings stay up longer
const DEFAULT_TTL_DAYS: i64 = 7;
const FEATURED_TTL_DAYS: i64 = 30;

/// Lead listing cap, and how many raw contact rows to scan for it
const MAX_LEADS: usize = 100;
const LEAD_SCAN_LIMIT: i64 = 500;

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Pre-verified owners and admins publish straight to OPEN; everyone else
/// waits in the moderation queue.
fn initial_status(owner_verified: bool, is_admin: bool) -> FreightStatus {
    if owner_verified || is_admin {
        FreightStatus::Open
    } else {
        FreightStatus::Pending
    }
}

fn expiry_for(is_featured: bool, now: DateTime<Utc>) -> DateTime<Utc> {
    let ttl = if is_featured {
        FEATURED_TTL_DAYS
    } else {
        DEFAULT_TTL_DAYS
    };
    now + Duration::days(ttl)
}

/// Whether an incoming optional field replaces the stored value with
/// something different.
fn differs(incoming: Option<&str>, current: &str) -> bool {
    match incoming {
        Some(value) => value != current,
        None => false,
    }
}

/// Per-freight interaction totals folded from the event log
#[derive(Debug, Clone, Copy, Default)]
struct InteractionTotals {
    leads: i64,
    views: i64,
    clicks: i64,
}

impl InteractionTotals {
    fn absorb(&mut self, event: &str) {
        match EventType::from_string(event) {
            Ok(EventType::WhatsappClick) => self.leads += 1,
            Ok(event) if event.is_view_kind() => self.views += 1,
            Ok(EventType::Click) => self.clicks += 1,
            _ => {},
        }
    }
}

type BoxedFreightQuery<'a> = crate::schema::freights::BoxedQuery<'a, diesel::pg::Pg>;

/// Apply the listing search to a boxed query. Words of two or more
/// characters must each match at least one searchable column; terms with no
/// such word fall back to a single substring match over product and states.
fn apply_search<'a>(mut query: BoxedFreightQuery<'a>, term: &str) -> BoxedFreightQuery<'a> {
    use crate::schema::freights::dsl;

    let words: Vec<&str> = term
        .split_whitespace()
        .filter(|w| w.chars().count() >= 2)
        .collect();

    if words.is_empty() {
        let pattern = format!("%{}%", term);
        return query.filter(
            dsl::product
                .ilike(pattern.clone())
                .or(dsl::origin_state.ilike(pattern.clone()))
                .or(dsl::dest_state.ilike(pattern)),
        );
    }

    for word in words {
        let pattern = format!("%{}%", word);
        query = query.filter(
            dsl::product
                .ilike(pattern.clone())
                .or(dsl::origin_city.ilike(pattern.clone()))
                .or(dsl::dest_city.ilike(pattern.clone()))
                .or(dsl::origin_state.ilike(pattern.clone()))
                .or(dsl::dest_state.ilike(pattern.clone()))
                .or(dsl::vehicle_type.ilike(pattern.clone()))
                .or(dsl::body_type.ilike(pattern.clone()))
                .or(dsl::description.ilike(pattern)),
        );
    }

    query
}

// =============================================================================
// FREIGHT SERVICE
// =============================================================================

pub struct FreightService {
    pool: DieselPool,
    slug_generator: SlugGenerator,
    rate_limiter: Arc<RateLimitService>,
    notifier: Arc<NotificationService>,
    matching: MatchingService,
    verification: VerificationService,
}

impl FreightService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.diesel_pool.clone(),
            slug_generator: SlugGenerator::new(state.diesel_pool.clone()),
            rate_limiter: state.rate_limit_service.clone(),
            notifier: state.notification_service.clone(),
            matching: MatchingService::new(
                state.diesel_pool.clone(),
                state.notification_service.clone(),
            ),
            verification: VerificationService::new(
                state.diesel_pool.clone(),
                state.notification_service.clone(),
            ),
        }
    }

    /// Create a freight listing
    #[instrument(skip(self, principal, request), fields(user_id = %principal.user_id))]
    pub async fn create(
        &self,
        principal: &AuthenticatedUser,
        mut request: CreateFreightRequest,
    ) -> Result<CreateFreightResponse, ServiceError> {
        info!("Creating freight listing for user: {}", principal.user_id);

        // 1. Policy gate: companies and admins publish loads
        if !PolicyTable::is_allowed(Action::CreateFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only companies can publish freight listings".to_string(),
            ));
        }

        // 2. Sanitize and validate the payload
        request.sanitize();
        request.validate()?;

        // 3. Document approval gate, waived for admins
        let mut conn = self.pool.get().await?;
        let owner = User::find_by_id(&mut conn, principal.user_id).await?;
        drop(conn);

        if !principal.is_admin() && !owner.is_document_approved() {
            return Err(ServiceError::Forbidden(
                "Document verification pending approval".to_string(),
            ));
        }

        // 4. One creation per account per minute; Redis outages fail open
        match self
            .rate_limiter
            .check_freight_creation(&principal.user_id.to_string())
            .await
        {
            Ok(result) if !result.allowed => {
                return Err(ServiceError::RateLimited {
                    retry_after: u64::from(result.retry_after.unwrap_or(60)),
                });
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Rate limit check unavailable, allowing creation: {}", e);
            },
        }

        // 5. Content filter over the caller-supplied text
        let combined = format!("{} {}", request.product, request.description);
        content_filter::check_content(&combined)
            .map_err(|violation| ServiceError::ValidationError(violation.to_string()))?;

        // 6. Unique public slug from product and route
        let slug = self
            .slug_generator
            .generate_freight_slug(&request.product, &request.origin_city, &request.dest_city)
            .await?;

        // 7. Initial status and expiry
        let status = initial_status(owner.is_verified, principal.is_admin());
        let expires_at = expiry_for(request.is_featured, Utc::now());

        let new_freight = NewFreight {
            id: Uuid::new_v4(),
            user_id: principal.user_id,
            origin_city: request.origin_city.clone(),
            origin_state: request.origin_state.clone(),
            dest_city: request.dest_city.clone(),
            dest_state: request.dest_state.clone(),
            product: request.product.clone(),
            weight: request.weight,
            price: request.price,
            vehicle_type: request.vehicle_type.clone(),
            body_type: request.body_type.clone(),
            description: request.description.clone(),
            status: status.as_str().to_string(),
            slug: slug.clone(),
            is_featured: request.is_featured,
            whatsapp: request.whatsapp.clone(),
            expires_at,
            payment_status: PaymentStatus::Pending.as_str().to_string(),
        };

        // 8. Insert within a transaction
        let freight = self.insert_freight(new_freight).await?;

        // 9. Audit the creation
        AuditLogger::log_freight_action(
            AuditAction::FreightCreated,
            principal.user_id,
            freight.id,
            Some(format!(
                "Created listing {} with status {}",
                slug,
                status.as_str()
            )),
        );

        // 10. Listings that went straight to OPEN are matched immediately
        if status == FreightStatus::Open {
            if let Err(e) = self.matching.trigger_matches(&freight).await {
                warn!("Driver matching failed for freight {}: {}", freight.id, e);
            }
        }

        let message = if status == FreightStatus::Open {
            "Frete publicado com sucesso.".to_string()
        } else {
            "Frete criado e aguardando aprovação.".to_string()
        };

        Ok(CreateFreightResponse {
            success: true,
            id: freight.id,
            slug: freight.slug,
            status,
            message,
        })
    }

    /// Partial update by the owner or an admin. The slug tracks listing
    /// identity and is regenerated only when product or a city changes.
    #[instrument(skip(self, principal, request))]
    pub async fn update(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
        mut request: UpdateFreightRequest,
    ) -> Result<Freight, ServiceError> {
        if !PolicyTable::is_allowed(Action::UpdateFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only companies can edit freight listings".to_string(),
            ));
        }

        request.sanitize();
        request.validate()?;
        if request.is_empty() {
            return Err(ServiceError::ValidationError(
                "Nothing to update".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let freight = Self::load_active(&mut conn, freight_id).await?;
        drop(conn);

        if freight.user_id != principal.user_id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Not the owner of this freight".to_string(),
            ));
        }

        if freight.status_enum().is_terminal() {
            return Err(ServiceError::Conflict(
                "Finished or closed freights cannot be edited".to_string(),
            ));
        }

        // Replacement text goes back through the content filter
        if request.product.is_some() || request.description.is_some() {
            let combined = format!(
                "{} {}",
                request.product.as_deref().unwrap_or(&freight.product),
                request
                    .description
                    .as_deref()
                    .unwrap_or(&freight.description),
            );
            content_filter::check_content(&combined)
                .map_err(|violation| ServiceError::ValidationError(violation.to_string()))?;
        }

        let identity_changed = differs(request.product.as_deref(), &freight.product)
            || differs(request.origin_city.as_deref(), &freight.origin_city)
            || differs(request.dest_city.as_deref(), &freight.dest_city);

        let slug = if identity_changed {
            let product = request.product.as_deref().unwrap_or(&freight.product);
            let origin = request.origin_city.as_deref().unwrap_or(&freight.origin_city);
            let dest = request.dest_city.as_deref().unwrap_or(&freight.dest_city);
            Some(
                self.slug_generator
                    .generate_freight_slug(product, origin, dest)
                    .await?,
            )
        } else {
            None
        };

        let changeset = FreightChangeset {
            origin_city: request.origin_city,
            origin_state: request.origin_state,
            dest_city: request.dest_city,
            dest_state: request.dest_state,
            product: request.product,
            weight: request.weight,
            price: request.price,
            vehicle_type: request.vehicle_type,
            body_type: request.body_type,
            description: request.description,
            slug,
            is_featured: None,
            // An empty string clears the stored number
            whatsapp: request
                .whatsapp
                .map(|w| if w.is_empty() { None } else { Some(w) }),
            expires_at: None,
        };

        use crate::schema::freights::dsl;

        let mut conn = self.pool.get().await?;
        let updated: Freight = diesel::update(dsl::freights.filter(dsl::id.eq(freight_id)))
            .set((&changeset, dsl::updated_at.eq(Utc::now())))
            .get_result(&mut conn)
            .await?;

        AuditLogger::log_freight_action(
            AuditAction::FreightUpdated,
            principal.user_id,
            freight_id,
            identity_changed.then(|| format!("Slug regenerated: {}", updated.slug)),
        );

        Ok(updated)
    }

    /// Soft delete: one guarded UPDATE sets deleted_at and closes the
    /// listing. A concurrent delete loses the race and reports not found.
    #[instrument(skip(self, principal))]
    pub async fn soft_delete(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
    ) -> Result<(), ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::DeleteFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only companies can remove freight listings".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let freight = Self::load_active(&mut conn, freight_id).await?;

        if freight.user_id != principal.user_id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Not the owner of this freight".to_string(),
            ));
        }

        let now = Utc::now();
        let updated = diesel::update(
            dsl::freights
                .filter(dsl::id.eq(freight_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set((
            dsl::deleted_at.eq(Some(now)),
            dsl::status.eq(FreightStatus::Closed.as_str()),
            dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            return Err(ServiceError::NotFound);
        }

        AuditLogger::log_freight_action(
            AuditAction::FreightDeleted,
            principal.user_id,
            freight_id,
            None,
        );
        info!("Freight {} closed by {}", freight_id, principal.user_id);

        Ok(())
    }

    /// Assign a driver to an OPEN freight. The row is locked for the check
    /// so concurrent assignments resolve first-writer-wins; late writers get
    /// a conflict. The driver hears about it only after the commit.
    #[instrument(skip(self, principal))]
    pub async fn assign_driver(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Freight, ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::AssignDriver, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only the contracting company can assign a driver".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;

        let driver = User::find_by_id(&mut conn, driver_id)
            .await
            .optional()?
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| ServiceError::ValidationError("Driver not found".to_string()))?;
        if driver.role_enum() != UserRole::Driver {
            return Err(ServiceError::ValidationError(
                "Selected user is not a driver".to_string(),
            ));
        }

        let principal_id = principal.user_id;
        let is_admin = principal.is_admin();

        let updated = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    // Row lock: the status check and the transition are atomic
                    let freight: Freight = dsl::freights
                        .filter(dsl::id.eq(freight_id))
                        .filter(dsl::deleted_at.is_null())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(ServiceError::NotFound)?;

                    if freight.user_id != principal_id && !is_admin {
                        return Err(ServiceError::Forbidden(
                            "Not the owner of this freight".to_string(),
                        ));
                    }

                    if freight.status_enum() != FreightStatus::Open {
                        return Err(ServiceError::Conflict(
                            "This freight is no longer available".to_string(),
                        ));
                    }

                    let updated: Freight =
                        diesel::update(dsl::freights.filter(dsl::id.eq(freight_id)))
                            .set((
                                dsl::status.eq(FreightStatus::InProgress.as_str()),
                                dsl::assigned_driver_id.eq(Some(driver_id)),
                                dsl::updated_at.eq(Utc::now()),
                            ))
                            .get_result(conn)
                            .await?;

                    Ok(updated)
                })
            })
            .await?;
        drop(conn);

        AuditLogger::log_freight_action(
            AuditAction::DriverAssigned,
            principal.user_id,
            freight_id,
            Some(format!("Assigned driver {}", driver_id)),
        );

        // Outbox: the confirmation reaches the driver only after commit
        let confirmation = NotificationRequest::new(
            driver_id,
            "Carga Confirmada! 🚛",
            format!(
                "Você foi confirmado para a carga de {}. Boa viagem!",
                updated.product
            ),
        )
        .kind(NotificationKind::Match)
        .priority(NotificationPriority::High)
        .action_url(format!("/freight/details/{}", updated.slug));
        self.notifier.dispatch_all(vec![confirmation]).await;

        Ok(updated)
    }

    /// Confirm the settlement of an in-progress freight. Payment moves
    /// PENDING to PAID and the freight finishes in the same transaction.
    #[instrument(skip(self, principal))]
    pub async fn confirm_payment(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
    ) -> Result<Freight, ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::ConfirmPayment, principal.role) {
            return Err(ServiceError::Forbidden(
                "Only the contracting company can confirm payment".to_string(),
            ));
        }

        let principal_id = principal.user_id;
        let is_admin = principal.is_admin();

        let mut conn = self.pool.get().await?;
        let updated = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let freight: Freight = dsl::freights
                        .filter(dsl::id.eq(freight_id))
                        .filter(dsl::deleted_at.is_null())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(ServiceError::NotFound)?;

                    if freight.user_id != principal_id && !is_admin {
                        return Err(ServiceError::Forbidden(
                            "Not the owner of this freight".to_string(),
                        ));
                    }

                    if freight.payment_status_enum() != PaymentStatus::Pending {
                        return Err(ServiceError::Conflict(format!(
                            "Payment already settled as {}",
                            freight.payment_status
                        )));
                    }

                    if freight.status_enum() != FreightStatus::InProgress {
                        return Err(ServiceError::Conflict(
                            "Only freights in progress can be settled".to_string(),
                        ));
                    }

                    let now = Utc::now();
                    let updated: Freight =
                        diesel::update(dsl::freights.filter(dsl::id.eq(freight_id)))
                            .set((
                                dsl::payment_status.eq(PaymentStatus::Paid.as_str()),
                                dsl::status.eq(FreightStatus::Finished.as_str()),
                                dsl::finished_at.eq(Some(now)),
                                dsl::updated_at.eq(now),
                            ))
                            .get_result(conn)
                            .await?;

                    Ok(updated)
                })
            })
            .await?;
        drop(conn);

        AuditLogger::log_freight_action(
            AuditAction::PaymentConfirmed,
            principal.user_id,
            freight_id,
            None,
        );

        // Settled deliveries feed the driver's cached reputation
        if let Some(assigned) = updated.assigned_driver_id {
            if let Err(e) = self.verification.refresh_reputation(assigned).await {
                warn!("Reputation refresh failed for driver {}: {}", assigned, e);
            }
        }

        Ok(updated)
    }

    /// Finish the delivery. Allowed to the assigned driver, the owner, or an
    /// admin; the guarded UPDATE makes the transition race-safe.
    #[instrument(skip(self, principal))]
    pub async fn finish(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
    ) -> Result<(), ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::FinishFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Not allowed to finish freights".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let freight = Self::load_active(&mut conn, freight_id).await?;

        let is_assigned_driver = freight.assigned_driver_id == Some(principal.user_id);
        if !is_assigned_driver && freight.user_id != principal.user_id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only the assigned driver or the owner can finish this freight".to_string(),
            ));
        }

        let now = Utc::now();
        let updated = diesel::update(
            dsl::freights
                .filter(dsl::id.eq(freight_id))
                .filter(dsl::status.eq(FreightStatus::InProgress.as_str())),
        )
        .set((
            dsl::status.eq(FreightStatus::Finished.as_str()),
            dsl::finished_at.eq(Some(now)),
            dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await?;
        drop(conn);

        if updated == 0 {
            return Err(ServiceError::Conflict(
                "Only freights in progress can be finished".to_string(),
            ));
        }

        AuditLogger::log_freight_action(
            AuditAction::DeliveryConfirmed,
            principal.user_id,
            freight_id,
            None,
        );

        // Reputation first, the owner's badge run second: the refreshed
        // rating feeds the badge criteria.
        if let Some(assigned) = freight.assigned_driver_id {
            if let Err(e) = self.verification.refresh_reputation(assigned).await {
                warn!("Reputation refresh failed for driver {}: {}", assigned, e);
            }
        }
        if let Err(e) = self.verification.run_verification(freight.user_id).await {
            warn!(
                "Verification run failed for owner {}: {}",
                freight.user_id, e
            );
        }

        Ok(())
    }

    /// Public listing: OPEN, not deleted, featured first, newest first.
    #[instrument(skip(self, query))]
    pub async fn list_paginated(
        &self,
        query: FreightListQuery,
    ) -> Result<FreightListResponse, ServiceError> {
        use crate::schema::freights::dsl;

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut conn = self.pool.get().await?;

        let mut list_query = dsl::freights
            .filter(dsl::deleted_at.is_null())
            .filter(dsl::status.eq(FreightStatus::Open.as_str()))
            .into_boxed();

        // Count total results (rebuild query for count)
        let mut count_query = dsl::freights
            .filter(dsl::deleted_at.is_null())
            .filter(dsl::status.eq(FreightStatus::Open.as_str()))
            .into_boxed();

        if let Some(ref search) = query.search {
            let term = search.trim();
            if !term.is_empty() {
                list_query = apply_search(list_query, term);
                count_query = apply_search(count_query, term);
            }
        }

        let total = count_query.count().get_result::<i64>(&mut conn).await?;

        let freights = list_query
            .order((dsl::is_featured.desc(), dsl::created_at.desc()))
            .limit(per_page)
            .offset((page - 1) * per_page)
            .load::<Freight>(&mut conn)
            .await?;

        let data = Self::attach_interactions(&mut conn, freights).await?;

        Ok(FreightListResponse {
            success: true,
            data,
            total,
            page,
            per_page,
            total_pages: ((total as f64) / (per_page as f64)).ceil() as i64,
        })
    }

    /// Public detail by slug, with owner display data and contact link
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug_value: &str) -> Result<FreightDetailResponse, ServiceError> {
        use crate::schema::freights::dsl;

        let mut conn = self.pool.get().await?;

        let freight: Freight = dsl::freights
            .filter(dsl::slug.eq(slug_value))
            .filter(dsl::deleted_at.is_null())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound)?;

        let owner = User::find_by_id(&mut conn, freight.user_id).await?;

        Ok(FreightDetailResponse {
            success: true,
            whatsapp_url: freight.whatsapp_url(),
            owner: owner.to_public(),
            freight,
        })
    }

    /// Owner dashboard: own listings in every status, with account totals
    #[instrument(skip(self, principal, query))]
    pub async fn list_mine(
        &self,
        principal: &AuthenticatedUser,
        query: FreightListQuery,
    ) -> Result<MyFreightsResponse, ServiceError> {
        use crate::schema::freights::dsl;

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut conn = self.pool.get().await?;

        let total = dsl::freights
            .filter(dsl::user_id.eq(principal.user_id))
            .filter(dsl::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let freights = dsl::freights
            .filter(dsl::user_id.eq(principal.user_id))
            .filter(dsl::deleted_at.is_null())
            .order(dsl::created_at.desc())
            .limit(per_page)
            .offset((page - 1) * per_page)
            .select(Freight::as_select())
            .load::<Freight>(&mut conn)
            .await?;

        let data = Self::attach_interactions(&mut conn, freights).await?;
        let stats = Self::owner_stats(&mut conn, principal.user_id, total).await?;

        Ok(MyFreightsResponse {
            success: true,
            data,
            stats,
            total,
            page,
            per_page,
        })
    }

    /// Users who initiated WhatsApp contact on the owner's listings, most
    /// recent first, one entry per user.
    #[instrument(skip(self, principal))]
    pub async fn list_leads(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<Vec<LeadItem>, ServiceError> {
        use crate::schema::click_logs::dsl as cl;
        use crate::schema::freights::dsl as f;
        use crate::schema::users::dsl as u;

        if !PolicyTable::is_allowed(Action::ViewLeads, principal.role) {
            return Err(ServiceError::Forbidden(
                "Leads are available to companies only".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;

        let owned: Vec<(Uuid, String)> = f::freights
            .filter(f::user_id.eq(principal.user_id))
            .select((f::id, f::product))
            .load(&mut conn)
            .await?;

        if owned.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = owned.iter().map(|(id, _)| *id).collect();
        let products: HashMap<Uuid, String> = owned.into_iter().collect();

        let contacts: Vec<(Option<Uuid>, Uuid, DateTime<Utc>)> = cl::click_logs
            .filter(cl::target_id.eq_any(&ids))
            .filter(cl::target_type.eq(TargetType::Freight.as_str()))
            .filter(cl::event_type.eq(EventType::WhatsappClick.as_str()))
            .filter(cl::user_id.is_not_null())
            .order(cl::created_at.desc())
            .limit(LEAD_SCAN_LIMIT)
            .select((cl::user_id, cl::target_id, cl::created_at))
            .load(&mut conn)
            .await?;

        // Keep each user's most recent contact only
        let mut seen: Vec<Uuid> = Vec::new();
        let mut picked: Vec<(Uuid, Uuid, DateTime<Utc>)> = Vec::new();
        for (viewer, target, contacted_at) in contacts {
            let viewer = match viewer {
                Some(v) => v,
                None => continue,
            };
            if seen.contains(&viewer) {
                continue;
            }
            seen.push(viewer);
            picked.push((viewer, target, contacted_at));
            if picked.len() >= MAX_LEADS {
                break;
            }
        }

        let user_ids: Vec<Uuid> = picked.iter().map(|(viewer, _, _)| *viewer).collect();
        let users: Vec<User> = u::users
            .filter(u::id.eq_any(&user_ids))
            .filter(u::deleted_at.is_null())
            .select(User::as_select())
            .load(&mut conn)
            .await?;
        let by_id: HashMap<Uuid, User> = users.into_iter().map(|user| (user.id, user)).collect();

        let leads = picked
            .into_iter()
            .filter_map(|(viewer, target, contacted_at)| {
                let user = by_id.get(&viewer)?;
                Some(LeadItem {
                    user: user.to_public(),
                    freight_id: target,
                    product: products.get(&target).cloned().unwrap_or_default(),
                    contacted_at,
                })
            })
            .collect();

        Ok(leads)
    }

    /// Append an interaction event and bump the matching counter column.
    /// Unknown listings report not found, never a server fault.
    #[instrument(skip(self, viewer))]
    pub async fn log_event(
        &self,
        viewer: Option<Uuid>,
        freight_id: Uuid,
        event: EventType,
    ) -> Result<(), ServiceError> {
        use crate::schema::freights::dsl;

        let mut conn = self.pool.get().await?;

        let known = diesel::select(diesel::dsl::exists(
            dsl::freights
                .filter(dsl::id.eq(freight_id))
                .filter(dsl::deleted_at.is_null()),
        ))
        .get_result::<bool>(&mut conn)
        .await?;
        if !known {
            return Err(ServiceError::NotFound);
        }

        let row = NewClickLog::new(viewer, freight_id, TargetType::Freight, event);
        diesel::insert_into(crate::schema::click_logs::table)
            .values(&row)
            .execute(&mut conn)
            .await?;

        // Approximate counters; precise figures come from the event log
        if event.is_view_kind() {
            diesel::update(dsl::freights.filter(dsl::id.eq(freight_id)))
                .set(dsl::views_count.eq(dsl::views_count + 1))
                .execute(&mut conn)
                .await?;
        } else {
            diesel::update(dsl::freights.filter(dsl::id.eq(freight_id)))
                .set(dsl::clicks_count.eq(dsl::clicks_count + 1))
                .execute(&mut conn)
                .await?;
        }

        Ok(())
    }

    /// Admin moderation: release a PENDING listing, optionally granting the
    /// featured flag. Matching fans out after the owner notification.
    #[instrument(skip(self, principal))]
    pub async fn approve(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
        featured: bool,
    ) -> Result<Freight, ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::ApproveFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Moderation requires an admin".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let now = Utc::now();

        let approved: Option<Freight> = if featured {
            diesel::update(
                dsl::freights
                    .filter(dsl::id.eq(freight_id))
                    .filter(dsl::deleted_at.is_null())
                    .filter(dsl::status.eq(FreightStatus::Pending.as_str())),
            )
            .set((
                dsl::status.eq(FreightStatus::Open.as_str()),
                dsl::is_featured.eq(true),
                dsl::expires_at.eq(now + Duration::days(FEATURED_TTL_DAYS)),
                dsl::updated_at.eq(now),
            ))
            .get_result(&mut conn)
            .await
            .optional()?
        } else {
            diesel::update(
                dsl::freights
                    .filter(dsl::id.eq(freight_id))
                    .filter(dsl::deleted_at.is_null())
                    .filter(dsl::status.eq(FreightStatus::Pending.as_str())),
            )
            .set((
                dsl::status.eq(FreightStatus::Open.as_str()),
                dsl::updated_at.eq(now),
            ))
            .get_result(&mut conn)
            .await
            .optional()?
        };
        drop(conn);

        let freight = approved.ok_or_else(|| {
            ServiceError::Conflict("Only pending freights can be approved".to_string())
        })?;

        AuditLogger::log_freight_action(
            AuditAction::FreightApproved,
            principal.user_id,
            freight_id,
            Some(format!("featured: {}", featured)),
        );

        // The owner hears first, then matching fans out to drivers
        let announcement = NotificationRequest::new(
            freight.user_id,
            "Frete Online!",
            format!(
                "Seu frete de {} foi aprovado e já está visível para motoristas.",
                freight.product
            ),
        )
        .kind(NotificationKind::Approval)
        .action_url(format!("/freight/details/{}", freight.slug));
        self.notifier.dispatch_all(vec![announcement]).await;

        if let Err(e) = self.matching.trigger_matches(&freight).await {
            warn!("Driver matching failed for freight {}: {}", freight.id, e);
        }

        Ok(freight)
    }

    /// Admin moderation: send a listing back to the moderation queue with a
    /// reason the owner can act on.
    #[instrument(skip(self, principal, reason))]
    pub async fn reject(
        &self,
        principal: &AuthenticatedUser,
        freight_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        use crate::schema::freights::dsl;

        if !PolicyTable::is_allowed(Action::ApproveFreight, principal.role) {
            return Err(ServiceError::Forbidden(
                "Moderation requires an admin".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let freight: Freight = diesel::update(
            dsl::freights
                .filter(dsl::id.eq(freight_id))
                .filter(dsl::deleted_at.is_null()),
        )
        .set((
            dsl::status.eq(FreightStatus::Pending.as_str()),
            dsl::updated_at.eq(Utc::now()),
        ))
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound)?;
        drop(conn);

        AuditLogger::log_freight_action(
            AuditAction::FreightRejected,
            principal.user_id,
            freight_id,
            reason.clone(),
        );

        let message = match reason {
            Some(r) => format!("Seu frete de {} não foi aprovado: {}", freight.product, r),
            None => format!("Seu frete de {} não foi aprovado.", freight.product),
        };
        let notice = NotificationRequest::new(freight.user_id, "Frete não aprovado", message)
            .kind(NotificationKind::Approval);
        self.notifier.dispatch_all(vec![notice]).await;

        Ok(())
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    async fn insert_freight(&self, new_freight: NewFreight) -> Result<Freight, ServiceError> {
        use crate::schema::freights::dsl;

        let mut conn = self.pool.get().await?;

        conn.build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    diesel::insert_into(dsl::freights)
                        .values(&new_freight)
                        .get_result::<Freight>(conn)
                        .await
                })
            })
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))
    }

    async fn load_active(
        conn: &mut AsyncPgConnection,
        freight_id: Uuid,
    ) -> Result<Freight, ServiceError> {
        use crate::schema::freights::dsl;

        dsl::freights
            .filter(dsl::id.eq(freight_id))
            .filter(dsl::deleted_at.is_null())
            .select(Freight::as_select())
            .first(conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound)
    }

    /// Fold the event log into per-item lead/view/click totals for a page
    async fn attach_interactions(
        conn: &mut AsyncPgConnection,
        freights: Vec<Freight>,
    ) -> Result<Vec<FreightListItem>, ServiceError> {
        use crate::schema::click_logs::dsl;

        if freights.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = freights.iter().map(|f| f.id).collect();
        let events: Vec<(Uuid, String)> = dsl::click_logs
            .filter(dsl::target_id.eq_any(&ids))
            .filter(dsl::target_type.eq(TargetType::Freight.as_str()))
            .select((dsl::target_id, dsl::event_type))
            .load(conn)
            .await?;

        let mut totals: HashMap<Uuid, InteractionTotals> = HashMap::new();
        for (target, event) in events {
            totals.entry(target).or_default().absorb(&event);
        }

        Ok(freights
            .into_iter()
            .map(|freight| {
                let t = totals.get(&freight.id).copied().unwrap_or_default();
                FreightListItem {
                    freight,
                    total_leads: t.leads,
                    total_views: t.views,
                    total_clicks: t.clicks,
                }
            })
            .collect())
    }

    async fn owner_stats(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        total_freights: i64,
    ) -> Result<OwnerStats, ServiceError> {
        use crate::schema::click_logs::dsl as cl;
        use crate::schema::freights::dsl as f;

        let ids: Vec<Uuid> = f::freights
            .filter(f::user_id.eq(owner))
            .filter(f::deleted_at.is_null())
            .select(f::id)
            .load(conn)
            .await?;

        if ids.is_empty() {
            return Ok(OwnerStats {
                total_freights,
                total_views: 0,
                total_clicks: 0,
                total_leads: 0,
                conversion_rate: 0.0,
            });
        }

        let events: Vec<String> = cl::click_logs
            .filter(cl::target_id.eq_any(&ids))
            .filter(cl::target_type.eq(TargetType::Freight.as_str()))
            .select(cl::event_type)
            .load(conn)
            .await?;

        let mut totals = InteractionTotals::default();
        for event in &events {
            totals.absorb(event);
        }

        let conversion_rate = if totals.views > 0 {
            (totals.leads as f64 / totals.views as f64) * 100.0
        } else {
            0.0
        };

        Ok(OwnerStats {
            total_freights,
            total_views: totals.views,
            total_clicks: totals.clicks,
            total_leads: totals.leads,
            conversion_rate,
        })
    }
}
