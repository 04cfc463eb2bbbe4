//! Core data model definitions shared across Vigil crates.

pub mod activity;
pub mod block;
pub mod error;
pub mod ids;
pub mod observation;
pub mod rule;
pub mod settings;
pub mod tag;

// Intentionally curated re-exports for downstream consumers.
pub use activity::{Activity, ActivityUpdate, DomainSlice, TimelineRow};
pub use block::BlockWindow;
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ActivityId, AssetId, RuleId, TagId};
pub use observation::{
    Observation, WindowHandle, PROCESS_IDLE, PROCESS_LOCKED, PROCESS_UNKNOWN,
    TAG_AWAY, TAG_UNCLASSIFIED,
};
pub use rule::{split_alternates, Rule, RuleDraft};
pub use settings::{SettingKey, Settings};
pub use tag::{MediaAsset, Tag, TagCategory, TagDraft};
