// Credit ledger endpoints. Grants live under the admin surface; this file
// only exposes the caller's own statement.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::{app::AppState, middleware::AuthenticatedUser, services::credits::CreditService};

// =============================================================================
// CREDIT HANDLERS
// =============================================================================

/// Latest ledger entries for the caller
/// GET /v1/credits/statement
#[utoipa::path(
    get,
    path = "/v1/credits/statement",
    tag = "Credits",
    operation_id = "creditStatement",
    responses(
        (status = 200, description = "Latest ledger entries, newest first"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn credit_statement(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    let credit_service = CreditService::new(&state);

    match credit_service.statement(&auth_user).await {
        Ok(entries) => Json(json!({ "success": true, "data": entries })).into_response(),
        Err(e) => e.into_response(),
    }
}
