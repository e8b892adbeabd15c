// HTTP surface of the marketplace core. Route groups are nested under /v1 by
// the binary; protected groups carry the bearer-token middleware so handlers
// can rely on AuthenticatedUser being present.

pub mod admin;
pub mod ads;
pub mod credits;
pub mod docs;
pub mod freights;
pub mod notifications;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::app::AppState;
use crate::middleware::auth_middleware;

// Freight routes: public catalog plus authenticated lifecycle operations
pub fn freight_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(freights::list_freights))
        .route("/details/{slug}", get(freights::get_freight_by_slug))
        .route("/{id}/events", post(freights::log_freight_event));

    let protected = Router::new()
        .route("/", post(freights::create_freight))
        .route("/mine", get(freights::list_my_freights))
        .route("/leads", get(freights::list_freight_leads))
        .route(
            "/{id}",
            put(freights::update_freight).delete(freights::delete_freight),
        )
        .route("/{id}/assign", post(freights::assign_driver))
        .route("/{id}/confirm-payment", post(freights::confirm_payment))
        .route("/{id}/finish", post(freights::finish_freight))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

// Ad routes: serving and metrics are public, management requires a token
pub fn ad_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(ads::serve_ads))
        .route("/impressions", post(ads::record_ad_impressions))
        .route("/event", post(ads::record_ad_event));

    let protected = Router::new()
        .route("/", post(ads::upsert_ad))
        .route("/{id}", delete(ads::delete_ad))
        .route("/{id}/report", get(ads::ad_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

// Notification feed routes
pub fn notification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/unread", get(notifications::unread_notifications))
        .route(
            "/unread-count",
            get(notifications::unread_notification_count),
        )
        .route("/{id}/read", post(notifications::mark_notification_read))
        .route("/read-all", post(notifications::mark_all_notifications_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

// Credit ledger routes
pub fn credit_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/statement", get(credits::credit_statement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

// Admin routes: moderation, verification overrides, grants and settings
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/freights/{id}/approve", post(admin::approve_freight))
        .route("/freights/{id}/reject", post(admin::reject_freight))
        .route("/users/{id}/verify", post(admin::set_user_verified))
        .route("/users/{id}/credits", post(admin::grant_credits))
        .route("/settings", put(admin::update_settings))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

// API documentation routes
pub fn docs_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(docs::serve_swagger_ui))
        .route("/openapi.json", get(docs::serve_openapi_spec))
}
