// Pricing snapshot for the billing engine. Loaded from site_settings at
// startup and on admin updates; billing code only ever sees the snapshot
// value, never the table.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::models::click_log::EventType;

pub const KEY_VIEW: &str = "ad_cost_view";
pub const KEY_VIEW_DETAILS: &str = "ad_cost_view_details";
pub const KEY_CLICK: &str = "ad_cost_click";
pub const KEY_WHATSAPP_CLICK: &str = "ad_cost_whatsapp_click";

/// Per-event credit costs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingConfig {
    pub view_cost: i64,
    pub view_details_cost: i64,
    pub click_cost: i64,
    pub whatsapp_click_cost: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            view_cost: 1,
            view_details_cost: 2,
            click_cost: 3,
            whatsapp_click_cost: 5,
        }
    }
}

impl PricingConfig {
    /// Build from site_settings key/value rows; unknown keys are ignored,
    /// missing or unparseable values keep their defaults.
    pub fn from_rows(rows: &[(String, String)]) -> Self {
        let mut config = PricingConfig::default();
        for (key, value) in rows {
            let parsed = match value.parse::<i64>() {
                Ok(v) if v >= 0 => v,
                _ => {
                    tracing::warn!("Ignoring invalid pricing value '{}' for {}", value, key);
                    continue;
                },
            };
            match key.as_str() {
                KEY_VIEW => config.view_cost = parsed,
                KEY_VIEW_DETAILS => config.view_details_cost = parsed,
                KEY_CLICK => config.click_cost = parsed,
                KEY_WHATSAPP_CLICK => config.whatsapp_click_cost = parsed,
                _ => {},
            }
        }
        config
    }

    /// Load the current snapshot from the settings table
    pub async fn load(conn: &mut AsyncPgConnection) -> Result<Self, diesel::result::Error> {
        use crate::schema::site_settings::dsl::*;

        let rows: Vec<(String, String)> = site_settings
            .filter(setting_key.like("ad_cost_%"))
            .select((setting_key, setting_value))
            .load(conn)
            .await?;

        Ok(PricingConfig::from_rows(&rows))
    }

    /// Cost of a billable event; None for events that are never billed
    pub fn cost_for(&self, event: EventType) -> Option<i64> {
        match event {
            EventType::View => Some(self.view_cost),
            EventType::ViewDetails => Some(self.view_details_cost),
            EventType::Click => Some(self.click_cost),
            EventType::WhatsappClick => Some(self.whatsapp_click_cost),
            EventType::Share | EventType::ContactInit => None,
        }
    }
}
