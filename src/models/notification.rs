// Notification model and the outbox request shape used by the dispatcher

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::notifications;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    System,
    Match,
    Approval,
    Verification,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::System => "system",
            NotificationKind::Match => "match",
            NotificationKind::Approval => "approval",
            NotificationKind::Verification => "verification",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, ToSchema)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub priority: String,
    pub action_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub priority: String,
    pub action_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A pending send, either dispatched directly or collected into an outbox
/// during a transaction and drained after commit.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub action_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NotificationRequest {
    pub fn new(user_id: Uuid, title: impl Into<String>, message: impl Into<String>) -> Self {
        NotificationRequest {
            user_id,
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::System,
            priority: NotificationPriority::Normal,
            action_url: None,
            metadata: None,
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    /// External fan-out applies to urgent or match traffic only
    pub fn wants_external_alert(&self) -> bool {
        self.priority == NotificationPriority::High || self.kind == NotificationKind::Match
    }

    pub fn into_row(self) -> NewNotification {
        NewNotification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind.as_str().to_string(),
            priority: self.priority.as_str().to_string(),
            action_url: self.action_url,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub success: bool,
    pub data: Vec<Notification>,
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_alert_rules() {
        let base = NotificationRequest::new(Uuid::new_v4(), "t", "m");
        assert!(!base.clone().wants_external_alert());
        assert!(base
            .clone()
            .priority(NotificationPriority::High)
            .wants_external_alert());
        assert!(base.kind(NotificationKind::Match).wants_external_alert());
    }

    #[test]
    fn into_row_maps_enums_to_strings() {
        let row = NotificationRequest::new(Uuid::new_v4(), "Carga compatível!", "msg")
            .kind(NotificationKind::Match)
            .priority(NotificationPriority::High)
            .action_url("/freight/details/soja-sp-pr-a1b2c3")
            .into_row();
        assert_eq!(row.kind, "match");
        assert_eq!(row.priority, "high");
        assert!(row.action_url.is_some());
    }
}
