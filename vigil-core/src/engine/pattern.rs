//! Compiled glob slots.
//!
//! A slot holds comma-separated alternates; the slot matches when any
//! alternate matches. Matching is case-sensitive and `*` crosses every
//! character, URLs included.

use globset::{GlobBuilder, GlobMatcher};

use vigil_model::split_alternates;

/// One pattern slot, compiled to matchers.
#[derive(Debug)]
pub struct PatternSet {
    matchers: Vec<GlobMatcher>,
}

impl PatternSet {
    /// Compile a comma-separated slot. `None` when the slot has no usable
    /// alternates; `Err` carries the first alternate that failed.
    pub fn compile(slot: &str) -> Result<Option<Self>, globset::Error> {
        let mut matchers = Vec::new();
        for alternate in split_alternates(slot) {
            let glob = GlobBuilder::new(alternate)
                .case_insensitive(false)
                .literal_separator(false)
                .build()?;
            matchers.push(glob.compile_matcher());
        }
        if matchers.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { matchers }))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_match_any() {
        let set = PatternSet::compile("chrome.exe, firefox.exe").unwrap().unwrap();
        assert!(set.matches("chrome.exe"));
        assert!(set.matches("firefox.exe"));
        assert!(!set.matches("msedge.exe"));
    }

    #[test]
    fn star_crosses_url_separators() {
        let set = PatternSet::compile("*slack.com*").unwrap().unwrap();
        assert!(set.matches("https://app.slack.com/client/T01/general"));
        assert!(!set.matches("https://example.com"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let set = PatternSet::compile("v?m").unwrap().unwrap();
        assert!(set.matches("vim"));
        assert!(!set.matches("vrrm"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let set = PatternSet::compile("Chrome*").unwrap().unwrap();
        assert!(set.matches("Chrome.exe"));
        assert!(!set.matches("chrome.exe"));
    }

    #[test]
    fn blank_slot_compiles_to_nothing() {
        assert!(PatternSet::compile("  , ,").unwrap().is_none());
    }

    #[test]
    fn malformed_alternate_is_an_error() {
        assert!(PatternSet::compile("app[").is_err());
    }
}
