// In-app notification read model. Writes happen inside the lifecycle and
// matching services; these endpoints only list and acknowledge.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState, middleware::AuthenticatedUser, models::notification::NotificationListResponse,
};

// =============================================================================
// NOTIFICATION HANDLERS
// =============================================================================

/// All notifications for the caller, newest first
/// GET /v1/notifications
#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Notifications",
    operation_id = "listNotifications",
    responses(
        (status = 200, description = "Notifications with unread total", body = NotificationListResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    let data = match state
        .notification_service
        .list_for_user(auth_user.user_id)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return e.into_response(),
    };

    match state.notification_service.unread_count(auth_user.user_id).await {
        Ok(unread_count) => Json(NotificationListResponse {
            success: true,
            data,
            unread_count,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Unread notifications only
/// GET /v1/notifications/unread
#[utoipa::path(
    get,
    path = "/v1/notifications/unread",
    tag = "Notifications",
    operation_id = "listUnreadNotifications",
    responses(
        (status = 200, description = "Unread notifications", body = NotificationListResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn unread_notifications(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    match state
        .notification_service
        .unread_for_user(auth_user.user_id)
        .await
    {
        Ok(data) => {
            let unread_count = data.len() as i64;
            Json(NotificationListResponse {
                success: true,
                data,
                unread_count,
            })
            .into_response()
        },
        Err(e) => e.into_response(),
    }
}

/// Unread notification count for badge rendering
/// GET /v1/notifications/unread-count
#[utoipa::path(
    get,
    path = "/v1/notifications/unread-count",
    tag = "Notifications",
    operation_id = "unreadNotificationCount",
    responses(
        (status = 200, description = "Unread count"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn unread_notification_count(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    match state.notification_service.unread_count(auth_user.user_id).await {
        Ok(count) => Json(json!({ "success": true, "count": count })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Mark one notification as read
/// POST /v1/notifications/{id}/read
#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/read",
    tag = "Notifications",
    operation_id = "markNotificationRead",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification acknowledged"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not the caller's notification")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(notification_id): Path<Uuid>,
) -> impl IntoResponse {
    match state
        .notification_service
        .mark_read(notification_id, auth_user.user_id)
        .await
    {
        Ok(true) => Json(json!({ "success": true })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Notification not found" })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Mark every unread notification as read
/// POST /v1/notifications/read-all
#[utoipa::path(
    post,
    path = "/v1/notifications/read-all",
    tag = "Notifications",
    operation_id = "markAllNotificationsRead",
    responses(
        (status = 200, description = "All notifications acknowledged"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> impl IntoResponse {
    match state
        .notification_service
        .mark_all_read(auth_user.user_id)
        .await
    {
        Ok(updated) => Json(json!({ "success": true, "updated": updated })).into_response(),
        Err(e) => e.into_response(),
    }
}
