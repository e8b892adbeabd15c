// Review rows feeding the cached reputation on user accounts

use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::reviews;

/// Moderation state, stored lowercase. Only published rows count toward
/// a user's cached rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Published,
    Hidden,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "published",
            ReviewStatus::Hidden => "hidden",
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub freight_id: Option<Uuid>,
    pub author_id: Uuid,
    pub target_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub status: String,
}

impl NewReview {
    pub fn published(
        freight_id: Option<Uuid>,
        author_id: Uuid,
        target_id: Uuid,
        rating: i32,
        comment: impl Into<String>,
    ) -> Self {
        NewReview {
            freight_id,
            author_id,
            target_id,
            rating: rating.clamp(1, 5),
            comment: comment.into(),
            status: ReviewStatus::Published.as_str().to_string(),
        }
    }
}
