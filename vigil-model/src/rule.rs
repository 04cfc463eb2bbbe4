use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{RuleId, TagId};

/// A priority-ordered classification predicate. Each pattern slot is a
/// comma-separated list of glob alternates; an empty slot matches nothing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub priority: i64,
    pub enabled: bool,
    pub process_pattern: Option<String>,
    pub url_pattern: Option<String>,
    pub window_title_pattern: Option<String>,
    pub browser_profile: Option<String>,
    pub process_path_pattern: Option<String>,
    pub tag_id: TagId,
    /// Joined for engine logging and export; not a column of the rules table.
    pub tag_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Mutation payload for creating or updating a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub enabled: Option<bool>,
    pub process_pattern: Option<String>,
    pub url_pattern: Option<String>,
    pub window_title_pattern: Option<String>,
    pub browser_profile: Option<String>,
    pub process_path_pattern: Option<String>,
    pub tag_id: Option<TagId>,
}

/// Split a comma-separated pattern slot into trimmed, non-empty alternates.
pub fn split_alternates(slot: &str) -> impl Iterator<Item = &str> {
    slot.split(',').map(str::trim).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_trim_and_drop_empties() {
        let parts: Vec<_> = split_alternates("chrome.exe, firefox.exe,, msedge.exe ").collect();
        assert_eq!(parts, ["chrome.exe", "firefox.exe", "msedge.exe"]);
    }
}
