// Key/value platform settings; the ad_cost_* keys feed the pricing snapshot

use std::collections::HashMap;

use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"settings": {"ad_cost_view": "1", "ad_cost_click": "3"}}))]
pub struct UpdateSettingsRequest {
    pub settings: HashMap<String, String>,
}
