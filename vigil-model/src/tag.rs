use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::block::BlockWindow;
use crate::error::ModelError;
use crate::ids::{AssetId, TagId};
use crate::observation::{TAG_AWAY, TAG_UNCLASSIFIED};

/// Coarse grouping used by the dashboard target metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TagCategory {
    Work,
    NonWork,
    #[default]
    Other,
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagCategory::Work => write!(f, "work"),
            TagCategory::NonWork => write!(f, "non_work"),
            TagCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for TagCategory {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "work" => Ok(TagCategory::Work),
            "non_work" => Ok(TagCategory::NonWork),
            "other" => Ok(TagCategory::Other),
            other => Err(ModelError::InvalidCategory(other.to_owned())),
        }
    }
}

/// A user-meaningful activity class with its alert and block configuration.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub category: TagCategory,
    pub alert_enabled: bool,
    pub alert_message: Option<String>,
    pub alert_cooldown: i64,
    pub block_enabled: bool,
    pub block_start_time: Option<String>,
    pub block_end_time: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Tag {
    /// The two convention-reserved tags are never alerted on or blocked.
    pub fn is_reserved(&self) -> bool {
        self.name == TAG_AWAY || self.name == TAG_UNCLASSIFIED
    }

    /// The parsed block window, or `None` when either side is missing or
    /// malformed (misconfiguration must never lock the user out).
    pub fn block_window(&self) -> Option<BlockWindow> {
        BlockWindow::parse(self.block_start_time.as_deref(), self.block_end_time.as_deref())
            .ok()
            .flatten()
    }
}

/// Mutation payload for creating or updating a tag. Unset fields keep their
/// current value on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagDraft {
    pub name: Option<String>,
    pub color: Option<String>,
    pub category: Option<TagCategory>,
    pub alert_enabled: Option<bool>,
    pub alert_message: Option<String>,
    pub alert_cooldown: Option<i64>,
    pub block_enabled: Option<bool>,
    pub block_start_time: Option<String>,
    pub block_end_time: Option<String>,
}

impl TagDraft {
    /// Whether this draft touches the block configuration at all; such
    /// updates are refused while the tag's block window is active.
    pub fn touches_block_config(&self) -> bool {
        self.block_enabled.is_some()
            || self.block_start_time.is_some()
            || self.block_end_time.is_some()
    }
}

/// Named pointer to an alert sound or image on disk.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaAsset {
    pub id: AssetId,
    pub name: String,
    pub file_path: String,
    pub created_at: NaiveDateTime,
}
