// Interaction event log: the append-only source for counters and billing

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::click_logs;

/// Interaction event, stored uppercase in the `event_type` column.
/// The first four are billable against ad owner credits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    View,
    ViewDetails,
    Click,
    WhatsappClick,
    Share,
    ContactInit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "VIEW",
            EventType::ViewDetails => "VIEW_DETAILS",
            EventType::Click => "CLICK",
            EventType::WhatsappClick => "WHATSAPP_CLICK",
            EventType::Share => "SHARE",
            EventType::ContactInit => "CONTACT_INIT",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "VIEW" => Ok(EventType::View),
            "VIEW_DETAILS" => Ok(EventType::ViewDetails),
            "CLICK" => Ok(EventType::Click),
            "WHATSAPP_CLICK" => Ok(EventType::WhatsappClick),
            "SHARE" => Ok(EventType::Share),
            "CONTACT_INIT" => Ok(EventType::ContactInit),
            _ => Err(format!("Invalid event type: {}", s)),
        }
    }

    /// Events priced against the ad owner's credit balance
    pub fn is_billable(&self) -> bool {
        matches!(
            self,
            EventType::View | EventType::ViewDetails | EventType::Click | EventType::WhatsappClick
        )
    }

    /// VIEW and VIEW_DETAILS feed views_count; everything else feeds clicks_count
    pub fn is_view_kind(&self) -> bool {
        matches!(self, EventType::View | EventType::ViewDetails)
    }
}

/// What the event targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Freight,
    Ad,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Freight => "freight",
            TargetType::Ad => "ad",
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = click_logs)]
pub struct NewClickLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub target_id: Uuid,
    pub target_type: String,
    pub event_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewClickLog {
    pub fn new(
        viewer: Option<Uuid>,
        target_id: Uuid,
        target_type: TargetType,
        event_type: EventType,
    ) -> Self {
        NewClickLog {
            id: Uuid::new_v4(),
            user_id: viewer,
            target_id,
            target_type: target_type.as_str().to_string(),
            event_type: event_type.as_str().to_string(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Body of the freight interaction endpoint; unknown or missing event
/// types fall back to VIEW.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LogEventRequest {
    pub event_type: Option<String>,
}

impl LogEventRequest {
    pub fn event(&self) -> EventType {
        self.event_type
            .as_deref()
            .and_then(|s| EventType::from_string(s).ok())
            .unwrap_or(EventType::View)
    }
}
