pub mod ad;
pub mod auth;
pub mod click_log;
pub mod credit;
pub mod freight;
pub mod notification;
pub mod review;
pub mod site_setting;
pub mod user;

// Re-export common types
pub use ad::{
    Ad, AdChangeset, AdEventRequest, AdImpressionsRequest, AdPerformancePoint, AdPlacement,
    AdReportResponse, AdServeQuery, AdServeResponse, AdStatus, NewAd, UpsertAdRequest,
};
pub use auth::*;
pub use click_log::{EventType, LogEventRequest, NewClickLog, TargetType};
pub use credit::{CreditTransaction, GrantCreditsRequest, NewCreditTransaction, TransactionKind};
pub use freight::{
    ApproveFreightRequest, AssignDriverRequest, CreateFreightRequest, CreateFreightResponse,
    Freight, FreightChangeset, FreightDetailResponse, FreightListItem, FreightListQuery,
    FreightListResponse, FreightStatus, LeadItem, MyFreightsResponse, NewFreight, OwnerStats,
    PaymentStatus, RejectFreightRequest, UpdateFreightRequest,
};
pub use notification::{
    NewNotification, Notification, NotificationKind, NotificationListResponse,
    NotificationPriority, NotificationRequest,
};
pub use review::{NewReview, ReviewStatus};
pub use site_setting::UpdateSettingsRequest;
pub use user::{DocumentStatus, NewUser, SetVerifiedRequest, User, UserPublic, UserRole};
