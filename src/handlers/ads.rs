// Ad serving and management endpoints. The metric endpoints are called from
// public pages on every render, so they answer 200 with success=false instead
// of surfacing errors to the client.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::{AuthenticatedUser, OptionalUser},
    models::ad::{AdEventRequest, AdImpressionsRequest, AdServeQuery, UpsertAdRequest},
    models::click_log::EventType,
    services::ads::AdService,
};

// =============================================================================
// AD HANDLERS
// =============================================================================

/// Serve ranked ads for a placement
/// GET /v1/ads
#[utoipa::path(
    get,
    path = "/v1/ads",
    tag = "Ads",
    operation_id = "serveAds",
    params(AdServeQuery),
    responses(
        (status = 200, description = "Ranked ads for the requested placement", body = AdServeResponse)
    )
)]
pub async fn serve_ads(
    State(state): State<AppState>,
    Query(query): Query<AdServeQuery>,
) -> impl IntoResponse {
    let ad_service = AdService::new(&state);

    match ad_service.find(query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record one impression per served ad and charge view costs
/// POST /v1/ads/impressions
#[utoipa::path(
    post,
    path = "/v1/ads/impressions",
    tag = "Ads",
    operation_id = "recordAdImpressions",
    request_body = AdImpressionsRequest,
    responses(
        (status = 200, description = "Always 200; success=false when recording failed")
    )
)]
pub async fn record_ad_impressions(
    State(state): State<AppState>,
    Json(request): Json<AdImpressionsRequest>,
) -> impl IntoResponse {
    let ad_service = AdService::new(&state);

    match ad_service.record_impressions(request.ids).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            tracing::warn!("Failed to record ad impressions: {}", e);
            Json(json!({ "success": false })).into_response()
        },
    }
}

/// Record a single ad interaction and charge its cost
/// POST /v1/ads/event
#[utoipa::path(
    post,
    path = "/v1/ads/event",
    tag = "Ads",
    operation_id = "recordAdEvent",
    request_body = AdEventRequest,
    responses(
        (status = 200, description = "Always 200; success=false when recording failed")
    )
)]
pub async fn record_ad_event(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Json(request): Json<AdEventRequest>,
) -> impl IntoResponse {
    let ad_id = match request.id {
        Some(id) => id,
        None => {
            return Json(json!({ "success": false, "message": "ID ausente" })).into_response();
        },
    };

    let event = request
        .event_type
        .as_deref()
        .and_then(|s| EventType::from_string(s).ok())
        .unwrap_or(EventType::Click);

    let ad_service = AdService::new(&state);
    let viewer_id = viewer.map(|user| user.user_id);

    match ad_service.record_event(viewer_id, ad_id, event).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            tracing::warn!("Failed to record ad event for {}: {}", ad_id, e);
            Json(json!({ "success": false })).into_response()
        },
    }
}

/// Create or update an ad
/// POST /v1/ads
#[utoipa::path(
    post,
    path = "/v1/ads",
    tag = "Ads",
    operation_id = "upsertAd",
    request_body = UpsertAdRequest,
    responses(
        (status = 200, description = "Saved ad", body = Ad),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not the ad owner"),
        (status = 404, description = "Unknown ad ID on update")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn upsert_ad(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<UpsertAdRequest>,
) -> impl IntoResponse {
    let ad_service = AdService::new(&state);

    match ad_service.upsert(&auth_user, request).await {
        Ok(ad) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": ad })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Soft-delete an ad
/// DELETE /v1/ads/{id}
#[utoipa::path(
    delete,
    path = "/v1/ads/{id}",
    tag = "Ads",
    operation_id = "deleteAd",
    params(
        ("id" = Uuid, Path, description = "Ad ID")
    ),
    responses(
        (status = 200, description = "Ad removed from serving"),
        (status = 403, description = "Not the ad owner"),
        (status = 404, description = "Unknown or already deleted ad")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_ad(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(ad_id): Path<Uuid>,
) -> impl IntoResponse {
    let ad_service = AdService::new(&state);

    match ad_service.soft_delete(&auth_user, ad_id).await {
        Ok(()) => Json(json!({ "success": true, "message": "Anúncio removido." })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Daily view and click series for an ad over the last 30 days
/// GET /v1/ads/{id}/report
#[utoipa::path(
    get,
    path = "/v1/ads/{id}/report",
    tag = "Ads",
    operation_id = "adPerformanceReport",
    params(
        ("id" = Uuid, Path, description = "Ad ID")
    ),
    responses(
        (status = 200, description = "Daily performance series", body = AdReportResponse),
        (status = 403, description = "Not the ad owner"),
        (status = 404, description = "Unknown ad")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn ad_report(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(ad_id): Path<Uuid>,
) -> impl IntoResponse {
    let ad_service = AdService::new(&state);

    match ad_service.performance_report(&auth_user, ad_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}
