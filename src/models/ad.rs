// Ad placement model: serving eligibility, upsert DTOs, report shapes

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::schema::ads;

/// Serving status, stored lowercase in the `status` column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Active,
    Paused,
    Rejected,
}

impl AdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Active => "active",
            AdStatus::Paused => "paused",
            AdStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "active" => Ok(AdStatus::Active),
            "paused" => Ok(AdStatus::Paused),
            "rejected" => Ok(AdStatus::Rejected),
            _ => Err(format!("Invalid ad status: {}", s)),
        }
    }
}

/// Ad model representing a database record
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = ads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ad {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub destination_url: String,
    pub image_url: String,
    pub location_city: String,
    pub location_state: String,
    pub position: String,
    pub status: String,
    pub views_count: i32,
    pub clicks_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New ad for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ads)]
pub struct NewAd {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub destination_url: String,
    pub image_url: String,
    pub location_city: String,
    pub location_state: String,
    pub position: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial ad update
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = ads)]
pub struct AdChangeset {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub destination_url: Option<String>,
    pub image_url: Option<String>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub position: Option<String>,
    pub status: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl Ad {
    pub fn status_enum(&self) -> AdStatus {
        AdStatus::from_string(&self.status).unwrap_or_else(|e| {
            tracing::warn!("Invalid status '{}' on ad {}: {}", self.status, self.id, e);
            AdStatus::Paused
        })
    }

    /// Serving eligibility: active, not deleted, not expired
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.is_deleted
            && self.status_enum() == AdStatus::Active
            && self.expires_at.map(|e| e >= now).unwrap_or(true)
    }
}

// =============================================================================
// REQUEST/RESPONSE DTOs
// =============================================================================

/// Create or update an ad placement
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "title": "Pneus para carreta com 20% off",
    "category": "PECAS",
    "description": "Loja parceira em Curitiba",
    "destination_url": "https://loja-exemplo.com.br/pneus",
    "image_url": "https://loja-exemplo.com.br/banner.png",
    "location_city": "Curitiba",
    "location_state": "PR",
    "position": "home"
}))]
pub struct UpsertAdRequest {
    /// Present on update, absent on create
    pub id: Option<Uuid>,

    #[validate(length(min = 1, max = 150, message = "Title is required"))]
    pub title: String,

    #[validate(length(max = 100, message = "Category must be less than 100 characters"))]
    #[serde(default)]
    pub category: String,

    #[validate(length(max = 2000, message = "Description must be less than 2000 characters"))]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub destination_url: String,

    #[serde(default)]
    pub image_url: String,

    #[validate(length(max = 100, message = "City must be less than 100 characters"))]
    #[serde(default)]
    pub location_city: String,

    #[validate(length(max = 100, message = "State must be less than 100 characters"))]
    #[serde(default)]
    pub location_state: String,

    #[validate(length(max = 50, message = "Position must be less than 50 characters"))]
    #[serde(default = "default_position")]
    pub position: String,

    pub expires_at: Option<DateTime<Utc>>,
}

fn default_position() -> String {
    "home".to_string()
}

impl UpsertAdRequest {
    pub fn sanitize(&mut self) {
        self.title = self.title.trim().to_string();
        self.category = self.category.trim().to_uppercase();
        self.description = self.description.trim().to_string();
        self.destination_url = self.destination_url.trim().to_string();
        self.image_url = self.image_url.trim().to_string();
        self.location_city = self.location_city.trim().to_string();
        self.location_state = self.location_state.trim().to_string();
        self.position = self.position.trim().to_lowercase();
    }

    /// URL fields are optional but must parse when present
    pub fn validate_custom(&self) -> Result<(), String> {
        for (field, value) in [
            ("destination_url", &self.destination_url),
            ("image_url", &self.image_url),
        ] {
            if !value.is_empty() && url::Url::parse(value).is_err() {
                return Err(format!("Invalid {}", field));
            }
        }
        Ok(())
    }
}

/// Query parameters for ad serving
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AdServeQuery {
    /// Placement slot, e.g. "home" or "freight_list"
    pub position: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

/// Public serve payload; internal ranking data stays server-side
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdPlacement {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub destination_url: String,
    pub position: String,
}

impl From<&Ad> for AdPlacement {
    fn from(ad: &Ad) -> Self {
        AdPlacement {
            id: ad.id,
            title: ad.title.clone(),
            category: ad.category.clone(),
            description: ad.description.clone(),
            image_url: ad.image_url.clone(),
            destination_url: ad.destination_url.clone(),
            position: ad.position.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdServeResponse {
    pub success: bool,
    pub data: Vec<AdPlacement>,
    /// Fewer than two ads returned; the client shows house banners instead
    pub show_fallback: bool,
}

/// Body of the ad click/metric endpoint. The id is optional on purpose:
/// its absence is reported as a soft failure, never a 4xx.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdEventRequest {
    pub id: Option<Uuid>,
    pub event_type: Option<String>,
}

/// Batch impression registration for a served page
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdImpressionsRequest {
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

/// One day of the 30-day performance report
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdPerformancePoint {
    pub date: NaiveDate,
    pub views: i64,
    pub clicks: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdReportResponse {
    pub success: bool,
    pub data: Vec<AdPerformancePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_ad() -> Ad {
        Ad {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Pneus".into(),
            category: "PECAS".into(),
            description: String::new(),
            destination_url: String::new(),
            image_url: String::new(),
            location_city: "Curitiba".into(),
            location_state: "PR".into(),
            position: "home".into(),
            status: "active".into(),
            views_count: 0,
            clicks_count: 0,
            expires_at: None,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn eligibility_requires_active_not_deleted_not_expired() {
        let now = Utc::now();
        let mut ad = sample_ad();
        assert!(ad.is_eligible(now));

        ad.status = "paused".into();
        assert!(!ad.is_eligible(now));

        ad.status = "active".into();
        ad.is_deleted = true;
        assert!(!ad.is_eligible(now));

        ad.is_deleted = false;
        ad.expires_at = Some(now - Duration::days(1));
        assert!(!ad.is_eligible(now));

        ad.expires_at = Some(now + Duration::days(1));
        assert!(ad.is_eligible(now));
    }

    #[test]
    fn upsert_rejects_malformed_urls() {
        let mut req = UpsertAdRequest {
            id: None,
            title: "Pneus".into(),
            category: "pecas".into(),
            description: String::new(),
            destination_url: "not a url".into(),
            image_url: String::new(),
            location_city: String::new(),
            location_state: String::new(),
            position: "home".into(),
            expires_at: None,
        };
        req.sanitize();
        assert!(req.validate_custom().is_err());

        req.destination_url = "https://loja.com.br/promo".into();
        assert!(req.validate_custom().is_ok());
        assert_eq!(req.category, "PECAS");
    }
}
