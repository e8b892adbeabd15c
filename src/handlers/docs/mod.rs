// OpenAPI documentation, aggregated from the per-handler annotations and
// served alongside an embedded Swagger UI.

mod swagger_ui;

pub use swagger_ui::serve_swagger_ui;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::models::{
    ad::{
        Ad, AdEventRequest, AdImpressionsRequest, AdPerformancePoint, AdPlacement,
        AdReportResponse, AdServeResponse, AdStatus, UpsertAdRequest,
    },
    click_log::LogEventRequest,
    credit::{CreditTransaction, GrantCreditsRequest},
    freight::{
        ApproveFreightRequest, AssignDriverRequest, CreateFreightRequest, CreateFreightResponse,
        Freight, FreightDetailResponse, FreightListItem, FreightListResponse, FreightStatus,
        LeadItem, MyFreightsResponse, OwnerStats, PaymentStatus, RejectFreightRequest,
        UpdateFreightRequest,
    },
    notification::{Notification, NotificationListResponse},
    site_setting::UpdateSettingsRequest,
    user::{SetVerifiedRequest, UserPublic},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChamaFrete API",
        version = "1.0.0",
        description = "Freight marketplace backend: listings, driver matching, ads and credits"
    ),
    paths(
        crate::handlers::freights::create_freight,
        crate::handlers::freights::list_freights,
        crate::handlers::freights::get_freight_by_slug,
        crate::handlers::freights::list_my_freights,
        crate::handlers::freights::list_freight_leads,
        crate::handlers::freights::update_freight,
        crate::handlers::freights::delete_freight,
        crate::handlers::freights::assign_driver,
        crate::handlers::freights::confirm_payment,
        crate::handlers::freights::finish_freight,
        crate::handlers::freights::log_freight_event,
        crate::handlers::ads::serve_ads,
        crate::handlers::ads::record_ad_impressions,
        crate::handlers::ads::record_ad_event,
        crate::handlers::ads::upsert_ad,
        crate::handlers::ads::delete_ad,
        crate::handlers::ads::ad_report,
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::unread_notifications,
        crate::handlers::notifications::unread_notification_count,
        crate::handlers::notifications::mark_notification_read,
        crate::handlers::notifications::mark_all_notifications_read,
        crate::handlers::credits::credit_statement,
        crate::handlers::admin::approve_freight,
        crate::handlers::admin::reject_freight,
        crate::handlers::admin::set_user_verified,
        crate::handlers::admin::grant_credits,
        crate::handlers::admin::update_settings,
    ),
    components(schemas(
        Freight,
        FreightStatus,
        PaymentStatus,
        CreateFreightRequest,
        CreateFreightResponse,
        UpdateFreightRequest,
        AssignDriverRequest,
        ApproveFreightRequest,
        RejectFreightRequest,
        FreightListItem,
        FreightListResponse,
        FreightDetailResponse,
        MyFreightsResponse,
        OwnerStats,
        LeadItem,
        LogEventRequest,
        Ad,
        AdStatus,
        UpsertAdRequest,
        AdPlacement,
        AdServeResponse,
        AdEventRequest,
        AdImpressionsRequest,
        AdPerformancePoint,
        AdReportResponse,
        Notification,
        NotificationListResponse,
        CreditTransaction,
        GrantCreditsRequest,
        SetVerifiedRequest,
        UserPublic,
        UpdateSettingsRequest,
    )),
    tags(
        (name = "Freights", description = "Freight listings and lifecycle"),
        (name = "Ads", description = "Ad serving, billing and management"),
        (name = "Notifications", description = "In-app notification feed"),
        (name = "Credits", description = "Credit ledger"),
        (name = "Admin", description = "Moderation and platform settings")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serve the generated OpenAPI document at /v1/docs/openapi.json
pub async fn serve_openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
