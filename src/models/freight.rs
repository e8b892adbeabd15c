// Freight listing model: lifecycle state machine, request DTOs, list items

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::user::UserPublic;
use crate::schema::freights;

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Freight lifecycle status, stored uppercase in the `status` column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreightStatus {
    Pending,
    Open,
    InProgress,
    Finished,
    Closed,
}

impl FreightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreightStatus::Pending => "PENDING",
            FreightStatus::Open => "OPEN",
            FreightStatus::InProgress => "IN_PROGRESS",
            FreightStatus::Finished => "FINISHED",
            FreightStatus::Closed => "CLOSED",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "PENDING" => Ok(FreightStatus::Pending),
            "OPEN" => Ok(FreightStatus::Open),
            "IN_PROGRESS" => Ok(FreightStatus::InProgress),
            "FINISHED" => Ok(FreightStatus::Finished),
            "CLOSED" => Ok(FreightStatus::Closed),
            _ => Err(format!("Invalid freight status: {}", s)),
        }
    }

    /// Terminal states accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, FreightStatus::Finished | FreightStatus::Closed)
    }

    /// Forward transitions of the lifecycle. Admin moderation overrides
    /// (reject back to PENDING) go through their own path and are not
    /// expressible here.
    pub fn can_transition_to(&self, next: FreightStatus) -> bool {
        use FreightStatus::*;

        match (self, next) {
            (Pending, Open) | (Pending, Closed) => true,
            (Open, InProgress) | (Open, Closed) => true,
            (InProgress, Finished) | (InProgress, Closed) => true,
            _ => false,
        }
    }
}

/// Payment status whitelist for freight settlements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

/// Freight model representing a database record
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = freights)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Freight {
    pub id: Uuid,
    pub user_id: Uuid,
    pub origin_city: String,
    pub origin_state: String,
    pub dest_city: String,
    pub dest_state: String,
    pub product: String,
    pub weight: f64,
    pub price: f64,
    pub vehicle_type: String,
    pub body_type: String,
    pub description: String,
    pub status: String,
    pub slug: String,
    pub is_featured: bool,
    pub whatsapp: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub assigned_driver_id: Option<Uuid>,
    pub payment_status: String,
    pub views_count: i32,
    pub clicks_count: i32,
    pub finished_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New freight for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = freights)]
pub struct NewFreight {
    pub id: Uuid,
    pub user_id: Uuid,
    pub origin_city: String,
    pub origin_state: String,
    pub dest_city: String,
    pub dest_state: String,
    pub product: String,
    pub weight: f64,
    pub price: f64,
    pub vehicle_type: String,
    pub body_type: String,
    pub description: String,
    pub status: String,
    pub slug: String,
    pub is_featured: bool,
    pub whatsapp: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub payment_status: String,
}

/// Partial update; None leaves the column untouched
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = freights)]
pub struct FreightChangeset {
    pub origin_city: Option<String>,
    pub origin_state: Option<String>,
    pub dest_city: Option<String>,
    pub dest_state: Option<String>,
    pub product: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub vehicle_type: Option<String>,
    pub body_type: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub is_featured: Option<bool>,
    pub whatsapp: Option<Option<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Freight {
    pub fn status_enum(&self) -> FreightStatus {
        FreightStatus::from_string(&self.status).unwrap_or_else(|e| {
            tracing::warn!("Invalid status '{}' on freight {}: {}", self.status, self.id, e);
            FreightStatus::Closed
        })
    }

    pub fn payment_status_enum(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid payment status '{}' on freight {}: {}",
                self.payment_status,
                self.id,
                e
            );
            PaymentStatus::Pending
        })
    }

    /// Contact link for the listing, when a WhatsApp number is present.
    /// Brazilian numbers without the country code get the 55 prefix.
    pub fn whatsapp_url(&self) -> Option<String> {
        let number = self.whatsapp.as_deref()?;
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let full = if digits.len() <= 11 {
            format!("55{}", digits)
        } else {
            digits
        };
        Some(format!("https://wa.me/{}", full))
    }
}

// =============================================================================
// REQUEST/RESPONSE DTOs
// =============================================================================

/// Request to create a freight listing
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "origin_city": "São Paulo",
    "origin_state": "SP",
    "dest_city": "Curitiba",
    "dest_state": "PR",
    "product": "Soja",
    "weight": 28000.0,
    "price": 4500.0,
    "vehicle_type": "Carreta",
    "body_type": "Graneleiro",
    "description": "Carga completa, carregamento na segunda.",
    "is_featured": false,
    "whatsapp": "41999990000"
}))]
pub struct CreateFreightRequest {
    #[validate(length(min = 1, max = 100, message = "Origin city is required"))]
    pub origin_city: String,

    #[validate(length(max = 50, message = "Origin state must be less than 50 characters"))]
    #[serde(default)]
    pub origin_state: String,

    #[validate(length(min = 1, max = 100, message = "Destination city is required"))]
    pub dest_city: String,

    #[validate(length(max = 50, message = "Destination state must be less than 50 characters"))]
    #[serde(default)]
    pub dest_state: String,

    #[validate(length(min = 1, max = 150, message = "Product is required"))]
    pub product: String,

    #[serde(default)]
    pub weight: f64,

    #[serde(default)]
    pub price: f64,

    #[validate(length(max = 50, message = "Vehicle type must be less than 50 characters"))]
    #[serde(default)]
    pub vehicle_type: String,

    #[validate(length(max = 50, message = "Body type must be less than 50 characters"))]
    #[serde(default)]
    pub body_type: String,

    #[validate(length(max = 5000, message = "Description must be less than 5000 characters"))]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub is_featured: bool,

    #[validate(length(max = 30, message = "WhatsApp must be less than 30 characters"))]
    pub whatsapp: Option<String>,
}

impl CreateFreightRequest {
    /// Trim text fields and clamp numeric fields to the valid range
    pub fn sanitize(&mut self) {
        self.origin_city = self.origin_city.trim().to_string();
        self.origin_state = self.origin_state.trim().to_uppercase();
        self.dest_city = self.dest_city.trim().to_string();
        self.dest_state = self.dest_state.trim().to_uppercase();
        self.product = self.product.trim().to_string();
        self.vehicle_type = self.vehicle_type.trim().to_string();
        self.body_type = self.body_type.trim().to_string();
        self.description = self.description.trim().to_string();
        self.whatsapp = self.whatsapp.as_ref().map(|s| s.trim().to_string());
        self.weight = self.weight.max(0.0);
        self.price = self.price.max(0.0);
    }
}

/// Request to update a freight listing; omitted fields keep their value
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFreightRequest {
    #[validate(length(min = 1, max = 100, message = "Origin city cannot be empty"))]
    pub origin_city: Option<String>,

    #[validate(length(max = 50, message = "Origin state must be less than 50 characters"))]
    pub origin_state: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Destination city cannot be empty"))]
    pub dest_city: Option<String>,

    #[validate(length(max = 50, message = "Destination state must be less than 50 characters"))]
    pub dest_state: Option<String>,

    #[validate(length(min = 1, max = 150, message = "Product cannot be empty"))]
    pub product: Option<String>,

    pub weight: Option<f64>,

    pub price: Option<f64>,

    #[validate(length(max = 50, message = "Vehicle type must be less than 50 characters"))]
    pub vehicle_type: Option<String>,

    #[validate(length(max = 50, message = "Body type must be less than 50 characters"))]
    pub body_type: Option<String>,

    #[validate(length(max = 5000, message = "Description must be less than 5000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 30, message = "WhatsApp must be less than 30 characters"))]
    pub whatsapp: Option<String>,
}

impl UpdateFreightRequest {
    pub fn sanitize(&mut self) {
        self.origin_city = self.origin_city.as_ref().map(|s| s.trim().to_string());
        self.origin_state = self.origin_state.as_ref().map(|s| s.trim().to_uppercase());
        self.dest_city = self.dest_city.as_ref().map(|s| s.trim().to_string());
        self.dest_state = self.dest_state.as_ref().map(|s| s.trim().to_uppercase());
        self.product = self.product.as_ref().map(|s| s.trim().to_string());
        self.vehicle_type = self.vehicle_type.as_ref().map(|s| s.trim().to_string());
        self.body_type = self.body_type.as_ref().map(|s| s.trim().to_string());
        self.description = self.description.as_ref().map(|s| s.trim().to_string());
        self.whatsapp = self.whatsapp.as_ref().map(|s| s.trim().to_string());
        self.weight = self.weight.map(|w| w.max(0.0));
        self.price = self.price.map(|p| p.max(0.0));
    }

    pub fn is_empty(&self) -> bool {
        self.origin_city.is_none()
            && self.origin_state.is_none()
            && self.dest_city.is_none()
            && self.dest_state.is_none()
            && self.product.is_none()
            && self.weight.is_none()
            && self.price.is_none()
            && self.vehicle_type.is_none()
            && self.body_type.is_none()
            && self.description.is_none()
            && self.whatsapp.is_none()
    }
}

/// Query parameters for the public listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FreightListQuery {
    /// Free-text search over product, route and vehicle fields
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Listing item with aggregated interaction counts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FreightListItem {
    #[serde(flatten)]
    pub freight: Freight,
    pub total_leads: i64,
    pub total_views: i64,
    pub total_clicks: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FreightListResponse {
    pub success: bool,
    pub data: Vec<FreightListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateFreightResponse {
    pub success: bool,
    pub id: Uuid,
    pub slug: String,
    pub status: FreightStatus,
    pub message: String,
}

/// Public detail payload with owner display data
#[derive(Debug, Serialize, ToSchema)]
pub struct FreightDetailResponse {
    pub success: bool,
    #[serde(flatten)]
    pub freight: Freight,
    pub owner: UserPublic,
    pub whatsapp_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

/// Admin moderation: release a pending listing
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApproveFreightRequest {
    /// Grant the featured flag along with the approval
    #[serde(default)]
    pub featured: bool,
}

/// Admin moderation: send a listing back with a reason
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RejectFreightRequest {
    pub reason: Option<String>,
}

/// Account-level interaction totals for the owner dashboard
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OwnerStats {
    pub total_freights: i64,
    pub total_views: i64,
    pub total_clicks: i64,
    pub total_leads: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyFreightsResponse {
    pub success: bool,
    pub data: Vec<FreightListItem>,
    pub stats: OwnerStats,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// A user who initiated WhatsApp contact on one of the owner's freights
#[derive(Debug, Serialize, ToSchema)]
pub struct LeadItem {
    pub user: UserPublic,
    pub freight_id: Uuid,
    pub product: String,
    pub contacted_at: DateTime<Utc>,
}
