// Admin-only surface: freight moderation, manual verification, credit grants
// and platform settings. Every handler gates on the policy table before
// touching data.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    config::{Action, PolicyTable, PricingConfig},
    middleware::AuthenticatedUser,
    models::credit::GrantCreditsRequest,
    models::freight::{ApproveFreightRequest, RejectFreightRequest},
    models::site_setting::UpdateSettingsRequest,
    models::user::SetVerifiedRequest,
    services::credits::CreditService,
    services::freight::FreightService,
    services::verification::VerificationService,
    utils::audit_logger::AuditLogger,
    utils::service_error::ServiceError,
};

// =============================================================================
// ADMIN HANDLERS
// =============================================================================

/// Approve a pending freight, optionally featuring it
/// POST /v1/admin/freights/{id}/approve
#[utoipa::path(
    post,
    path = "/v1/admin/freights/{id}/approve",
    tag = "Admin",
    operation_id = "approveFreight",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    request_body = ApproveFreightRequest,
    responses(
        (status = 200, description = "Freight published"),
        (status = 403, description = "Moderation requires an admin"),
        (status = 409, description = "Freight is not pending review")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn approve_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
    Json(request): Json<ApproveFreightRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service
        .approve(&auth_user, freight_id, request.featured)
        .await
    {
        Ok(freight) => Json(json!({ "success": true, "data": freight })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Push a freight back to moderation with an optional reason
/// POST /v1/admin/freights/{id}/reject
#[utoipa::path(
    post,
    path = "/v1/admin/freights/{id}/reject",
    tag = "Admin",
    operation_id = "rejectFreight",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    request_body = RejectFreightRequest,
    responses(
        (status = 200, description = "Freight returned to moderation"),
        (status = 403, description = "Moderation requires an admin"),
        (status = 404, description = "Unknown or deleted freight")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn reject_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
    Json(request): Json<RejectFreightRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service
        .reject(&auth_user, freight_id, request.reason)
        .await
    {
        Ok(()) => Json(json!({ "success": true, "message": "Frete devolvido para revisão." }))
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Force a user's verification flag
/// POST /v1/admin/users/{id}/verify
#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/verify",
    tag = "Admin",
    operation_id = "setUserVerified",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = SetVerifiedRequest,
    responses(
        (status = 200, description = "Verification flag updated"),
        (status = 403, description = "Verification overrides require an admin"),
        (status = 404, description = "Unknown user")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn set_user_verified(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SetVerifiedRequest>,
) -> impl IntoResponse {
    if !PolicyTable::is_allowed(Action::VerifyUser, auth_user.role) {
        return ServiceError::Forbidden("Verification overrides require an admin".to_string())
            .into_response();
    }

    let verification_service = VerificationService::new(
        state.diesel_pool.clone(),
        state.notification_service.clone(),
    );

    match verification_service
        .admin_set_verified(auth_user.user_id, user_id, request.verified)
        .await
    {
        Ok(()) => Json(json!({ "success": true, "verified": request.verified })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Grant credits to a user's balance
/// POST /v1/admin/users/{id}/credits
#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/credits",
    tag = "Admin",
    operation_id = "grantCredits",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = GrantCreditsRequest,
    responses(
        (status = 200, description = "Credits granted, returns the new balance"),
        (status = 400, description = "Amount must be positive"),
        (status = 403, description = "Credit grants require an admin"),
        (status = 404, description = "Unknown or deleted user")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn grant_credits(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<GrantCreditsRequest>,
) -> impl IntoResponse {
    let credit_service = CreditService::new(&state);

    match credit_service.grant(&auth_user, user_id, request).await {
        Ok(balance) => Json(json!({ "success": true, "balance": balance })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Upsert platform settings and refresh the pricing snapshot
/// PUT /v1/admin/settings
#[utoipa::path(
    put,
    path = "/v1/admin/settings",
    tag = "Admin",
    operation_id = "updateSettings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings stored, returns the active pricing"),
        (status = 400, description = "Empty payload or oversized key/value"),
        (status = 403, description = "Settings require an admin")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> impl IntoResponse {
    if !PolicyTable::is_allowed(Action::ManageSettings, auth_user.role) {
        return ServiceError::Forbidden("Settings require an admin".to_string()).into_response();
    }

    let keys: Vec<String> = request.settings.keys().cloned().collect();

    match apply_settings(&state, request.settings).await {
        Ok(pricing) => {
            *state.pricing.write().await = pricing;
            info!("Pricing snapshot refreshed: {:?}", pricing);
            AuditLogger::log_settings_action(auth_user.user_id, Some(keys.join(", ")));
            Json(json!({ "success": true, "pricing": pricing })).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// Upsert each submitted key and reload the pricing snapshot from the table.
async fn apply_settings(
    state: &AppState,
    settings: HashMap<String, String>,
) -> Result<PricingConfig, ServiceError> {
    use crate::schema::site_settings::dsl;

    if settings.is_empty() {
        return Err(ServiceError::ValidationError(
            "No settings provided".to_string(),
        ));
    }
    for (key, value) in &settings {
        if key.is_empty() || key.len() > 100 || value.len() > 255 {
            return Err(ServiceError::ValidationError(format!(
                "Invalid setting '{}'",
                key
            )));
        }
    }

    let mut conn = state.diesel_pool.get().await?;
    let now = Utc::now();
    for (key, value) in &settings {
        diesel::insert_into(dsl::site_settings)
            .values((
                dsl::setting_key.eq(key),
                dsl::setting_value.eq(value),
                dsl::updated_at.eq(now),
            ))
            .on_conflict(dsl::setting_key)
            .do_update()
            .set((
                dsl::setting_value.eq(excluded(dsl::setting_value)),
                dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await?;
    }

    let fresh = PricingConfig::load(&mut conn).await?;
    Ok(fresh)
}
