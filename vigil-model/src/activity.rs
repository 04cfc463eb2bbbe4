use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{ActivityId, RuleId, TagId};

/// One contiguous observation interval. `end_time` is NULL only for the
/// currently-open activity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: ActivityId,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub browser_url: Option<String>,
    pub browser_profile: Option<String>,
    pub tag_id: Option<TagId>,
    pub rule_id: Option<RuleId>,
}

/// Timeline row: an activity joined with its tag's display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimelineRow {
    pub id: ActivityId,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub browser_url: Option<String>,
    pub browser_profile: Option<String>,
    pub tag_id: Option<TagId>,
    pub rule_id: Option<RuleId>,
    pub tag_name: Option<String>,
    pub tag_color: Option<String>,
}

/// Frame broadcast to the façade's WebSocket clients on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityUpdate {
    pub activity_id: ActivityId,
    pub process_name: String,
    pub window_title: String,
    pub browser_url: Option<String>,
    pub browser_profile: Option<String>,
    pub tag_id: Option<TagId>,
    pub tag_name: Option<String>,
    pub started_at: NaiveDateTime,
}

/// Aggregated seconds per browser domain, for the period dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSlice {
    pub domain: String,
    pub total_seconds: f64,
}
