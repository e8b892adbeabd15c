// Freight listing endpoints: public catalog and detail, owner dashboard,
// and the lifecycle mutations.

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
    models::click_log::LogEventRequest,
    models::freight::{
        AssignDriverRequest, CreateFreightRequest, FreightListQuery, UpdateFreightRequest,
    },
    services::freight::FreightService,
};

// =============================================================================
// FREIGHT HANDLERS
// =============================================================================

/// Create a freight listing
/// POST /v1/freights
#[utoipa::path(
    post,
    path = "/v1/freights",
    tag = "Freights",
    operation_id = "createFreight",
    request_body = CreateFreightRequest,
    responses(
        (status = 201, description = "Freight created", body = CreateFreightResponse),
        (status = 400, description = "Validation or content filter failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role or document approval missing"),
        (status = 429, description = "Creation rate limit hit")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<CreateFreightRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.create(&auth_user, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Public paginated listing of OPEN freights
/// GET /v1/freights
#[utoipa::path(
    get,
    path = "/v1/freights",
    tag = "Freights",
    operation_id = "listFreights",
    params(FreightListQuery),
    responses(
        (status = 200, description = "Page of open freights", body = FreightListResponse)
    )
)]
pub async fn list_freights(
    State(state): State<AppState>,
    Query(query): Query<FreightListQuery>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.list_paginated(query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Public freight detail by slug
/// GET /v1/freights/details/{slug}
#[utoipa::path(
    get,
    path = "/v1/freights/details/{slug}",
    tag = "Freights",
    operation_id = "getFreightBySlug",
    params(
        ("slug" = String, Path, description = "Public freight slug")
    ),
    responses(
        (status = 200, description = "Freight detail with owner display data", body = FreightDetailResponse),
        (status = 404, description = "Unknown or deleted freight")
    )
)]
pub async fn get_freight_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.get_by_slug(&slug).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Owner dashboard listing with account totals
/// GET /v1/freights/mine
#[utoipa::path(
    get,
    path = "/v1/freights/mine",
    tag = "Freights",
    operation_id = "listMyFreights",
    params(FreightListQuery),
    responses(
        (status = 200, description = "Own freights in every status", body = MyFreightsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn list_my_freights(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Query(query): Query<FreightListQuery>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.list_mine(&auth_user, query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Users who initiated WhatsApp contact on the owner's listings
/// GET /v1/freights/leads
#[utoipa::path(
    get,
    path = "/v1/freights/leads",
    tag = "Freights",
    operation_id = "listFreightLeads",
    responses(
        (status = 200, description = "Leads, most recent first"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Leads are company-only")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn list_freight_leads(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.list_leads(&auth_user).await {
        Ok(leads) => Json(json!({ "success": true, "data": leads })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update a freight listing
/// PUT /v1/freights/{id}
#[utoipa::path(
    put,
    path = "/v1/freights/{id}",
    tag = "Freights",
    operation_id = "updateFreight",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    request_body = UpdateFreightRequest,
    responses(
        (status = 200, description = "Updated freight"),
        (status = 400, description = "Validation failure or empty update"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown or deleted freight"),
        (status = 409, description = "Terminal freights refuse edits")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
    Json(request): Json<UpdateFreightRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.update(&auth_user, freight_id, request).await {
        Ok(freight) => Json(json!({ "success": true, "data": freight })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Soft-delete a freight listing
/// DELETE /v1/freights/{id}
#[utoipa::path(
    delete,
    path = "/v1/freights/{id}",
    tag = "Freights",
    operation_id = "deleteFreight",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    responses(
        (status = 200, description = "Freight closed and hidden"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown or already deleted")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.soft_delete(&auth_user, freight_id).await {
        Ok(()) => Json(json!({ "success": true, "message": "Frete removido." })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Assign a driver to an OPEN freight
/// POST /v1/freights/{id}/assign
#[utoipa::path(
    post,
    path = "/v1/freights/{id}/assign",
    tag = "Freights",
    operation_id = "assignDriver",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    request_body = AssignDriverRequest,
    responses(
        (status = 200, description = "Driver assigned, freight in progress"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown freight"),
        (status = 409, description = "Freight no longer available")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_driver(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
    Json(request): Json<AssignDriverRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service
        .assign_driver(&auth_user, freight_id, request.driver_id)
        .await
    {
        Ok(freight) => Json(json!({ "success": true, "data": freight })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Confirm payment and settle the freight
/// POST /v1/freights/{id}/confirm-payment
#[utoipa::path(
    post,
    path = "/v1/freights/{id}/confirm-payment",
    tag = "Freights",
    operation_id = "confirmPayment",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    responses(
        (status = 200, description = "Payment settled, freight finished"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown freight"),
        (status = 409, description = "Wrong payment or freight state")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.confirm_payment(&auth_user, freight_id).await {
        Ok(freight) => Json(json!({ "success": true, "data": freight })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Finish the delivery of an in-progress freight
/// POST /v1/freights/{id}/finish
#[utoipa::path(
    post,
    path = "/v1/freights/{id}/finish",
    tag = "Freights",
    operation_id = "finishFreight",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    responses(
        (status = 200, description = "Freight finished"),
        (status = 403, description = "Not the assigned driver or owner"),
        (status = 404, description = "Unknown freight"),
        (status = 409, description = "Freight is not in progress")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn finish_freight(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(freight_id): Path<Uuid>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);

    match freight_service.finish(&auth_user, freight_id).await {
        Ok(()) => {
            Json(json!({ "success": true, "message": "Frete finalizado." })).into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// Register an interaction event against a freight
/// POST /v1/freights/{id}/events
#[utoipa::path(
    post,
    path = "/v1/freights/{id}/events",
    tag = "Freights",
    operation_id = "logFreightEvent",
    params(
        ("id" = Uuid, Path, description = "Freight ID")
    ),
    request_body = LogEventRequest,
    responses(
        (status = 200, description = "Event recorded"),
        (status = 404, description = "Unknown or deleted freight")
    )
)]
pub async fn log_freight_event(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(freight_id): Path<Uuid>,
    Json(request): Json<LogEventRequest>,
) -> impl IntoResponse {
    let freight_service = FreightService::new(&state);
    let viewer_id = viewer.map(|user| user.user_id);

    match freight_service
        .log_event(viewer_id, freight_id, request.event())
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => e.into_response(),
    }
}
