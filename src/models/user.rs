// User account model: roles, verification, driver matching profile, credits

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::users;

/// Platform role, stored lowercase in the `role` column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Driver,
    Company,
    Advertiser,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Driver => "driver",
            UserRole::Company => "company",
            UserRole::Advertiser => "advertiser",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "driver" => Ok(UserRole::Driver),
            "company" => Ok(UserRole::Company),
            "advertiser" => Ok(UserRole::Advertiser),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// Document verification status set by the moderation pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "approved" => Ok(DocumentStatus::Approved),
            "rejected" => Ok(DocumentStatus::Rejected),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// User model representing a database record
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub role: String,
    pub document_status: String,
    pub is_verified: bool,
    pub rating_avg: f64,
    pub rating_count: i32,
    pub balance: i64,
    pub avatar_url: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub vehicle_type: Option<String>,
    pub body_type: Option<String>,
    pub preferred_region: Option<String>,
    pub push_token: Option<String>,
    pub profile_slug: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub role: String,
    pub document_status: String,
    pub is_verified: bool,
    pub balance: i64,
}

/// Admin override for the verification badge
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetVerifiedRequest {
    pub verified: bool,
}

/// Public owner/driver display data attached to freight responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub name: String,
    pub is_verified: bool,
    pub rating_avg: f64,
    pub rating_count: i32,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_slug: Option<String>,
}

impl User {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        users.filter(id.eq(user_id)).first::<User>(conn).await
    }

    /// Role column as enum, defaulting to Driver on unknown values
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid role '{}' for user {}, defaulting to driver: {}",
                self.role,
                self.id,
                e
            );
            UserRole::Driver
        })
    }

    pub fn document_status_enum(&self) -> DocumentStatus {
        DocumentStatus::from_string(&self.document_status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid document status '{}' for user {}, defaulting to pending: {}",
                self.document_status,
                self.id,
                e
            );
            DocumentStatus::Pending
        })
    }

    pub fn is_document_approved(&self) -> bool {
        self.document_status_enum() == DocumentStatus::Approved
    }

    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            name: self.name.clone(),
            is_verified: self.is_verified,
            rating_avg: self.rating_avg,
            rating_count: self.rating_count,
            city: self.city.clone(),
            avatar_url: self.avatar_url.clone(),
            profile_slug: self.profile_slug.clone(),
        }
    }
}
