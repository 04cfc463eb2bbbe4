//! Observation → tag classification.
//!
//! The enabled rule list is cached priority-descending and walked in
//! order; within a rule the populated slots are OR-ed, and the first
//! matching rule wins. The cache is replaced wholesale on reload, never
//! mutated, so an in-flight classification always sees one consistent
//! snapshot.

mod pattern;

pub use pattern::PatternSet;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use vigil_model::{Observation, Rule, RuleId, TagCategory, TagId, TAG_UNCLASSIFIED};

use crate::error::Result;
use crate::store::Database;

const UNCLASSIFIED_COLOR: &str = "#607D8B";

#[derive(Debug)]
struct CompiledRule {
    id: RuleId,
    name: String,
    tag_id: TagId,
    tag_name: String,
    process: Option<PatternSet>,
    url: Option<PatternSet>,
    title: Option<PatternSet>,
    path: Option<PatternSet>,
    profile: Option<String>,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> std::result::Result<Self, globset::Error> {
        let slot = |value: &Option<String>| -> std::result::Result<Option<PatternSet>, globset::Error> {
            match value.as_deref() {
                Some(raw) => PatternSet::compile(raw),
                None => Ok(None),
            }
        };
        Ok(Self {
            id: rule.id,
            name: rule.name.clone(),
            tag_id: rule.tag_id,
            tag_name: rule.tag_name.clone(),
            process: slot(&rule.process_pattern)?,
            url: slot(&rule.url_pattern)?,
            title: slot(&rule.window_title_pattern)?,
            path: slot(&rule.process_path_pattern)?,
            profile: rule
                .browser_profile
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned),
        })
    }

    /// OR across slots; an empty slot never matches.
    fn matches(&self, obs: &Observation) -> bool {
        if let Some(set) = &self.process {
            if !obs.process_name.is_empty() && set.matches(&obs.process_name) {
                return true;
            }
        }
        if let (Some(set), Some(url)) = (&self.url, obs.browser_url.as_deref()) {
            if set.matches(url) {
                return true;
            }
        }
        if let (Some(expected), Some(profile)) = (&self.profile, obs.browser_profile.as_deref()) {
            if expected == profile {
                return true;
            }
        }
        if let Some(set) = &self.title {
            if !obs.window_title.is_empty() && set.matches(&obs.window_title) {
                return true;
            }
        }
        if let (Some(set), Some(path)) = (&self.path, obs.process_path.as_deref()) {
            if set.matches(path) {
                return true;
            }
        }
        false
    }
}

pub struct RuleEngine {
    db: Database,
    cache: ArcSwap<Vec<CompiledRule>>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("cached_rules", &self.cache.load().len())
            .finish()
    }
}

impl RuleEngine {
    pub async fn new(db: Database) -> Result<Self> {
        let engine = Self {
            db,
            cache: ArcSwap::from_pointee(Vec::new()),
        };
        engine.reload().await?;
        Ok(engine)
    }

    /// Re-read the enabled rules and swap in a fresh snapshot. Rules whose
    /// patterns fail to compile are skipped with a warning.
    pub async fn reload(&self) -> Result<()> {
        let rules = self.db.list_rules(true).await?;
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in &rules {
            match CompiledRule::compile(rule) {
                Ok(c) => compiled.push(c),
                Err(err) => {
                    warn!(rule = %rule.name, %err, "skipping rule with malformed pattern");
                }
            }
        }
        debug!(count = compiled.len(), "rule cache reloaded");
        self.cache.store(Arc::new(compiled));
        Ok(())
    }

    /// Classify an observation. Never returns a null tag: a miss lands on
    /// the *Unclassified* tag, which is recreated if someone deleted it.
    pub async fn classify(&self, obs: &Observation) -> Result<(TagId, Option<RuleId>)> {
        let snapshot = self.cache.load_full();
        for rule in snapshot.iter() {
            if rule.matches(obs) {
                debug!(rule = %rule.name, tag = %rule.tag_name, "rule matched");
                return Ok((rule.tag_id, Some(rule.id)));
            }
        }
        Ok((self.unclassified_tag().await?, None))
    }

    async fn unclassified_tag(&self) -> Result<TagId> {
        if let Some(tag) = self.db.tag_by_name(TAG_UNCLASSIFIED).await? {
            return Ok(tag.id);
        }
        warn!("the reserved `{TAG_UNCLASSIFIED}` tag is missing, recreating it");
        self.db
            .create_tag(TAG_UNCLASSIFIED, UNCLASSIFIED_COLOR, TagCategory::Other)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;
    use vigil_model::RuleDraft;

    fn obs(process: &str, title: &str, url: Option<&str>) -> Observation {
        Observation {
            process_name: process.into(),
            window_title: title.into(),
            browser_url: url.map(Into::into),
            browser_profile: None,
            process_path: None,
            hwnd: None,
        }
    }

    async fn add_rule(db: &Database, name: &str, tag: TagId, draft: RuleDraft) -> RuleId {
        db.create_rule(name, tag, &draft).await.unwrap()
    }

    #[tokio::test]
    async fn sentinel_observations_classify_as_away() {
        let (db, _dir) = open_temp().await;
        let engine = RuleEngine::new(db.clone()).await.unwrap();
        let away = db.tag_by_name("Away").await.unwrap().unwrap();

        let (tag, rule) = engine.classify(&Observation::locked()).await.unwrap();
        assert_eq!(tag, away.id);
        assert!(rule.is_some());

        let (tag, _) = engine.classify(&Observation::idle()).await.unwrap();
        assert_eq!(tag, away.id);
    }

    #[tokio::test]
    async fn priority_order_decides_between_overlapping_rules() {
        let (db, _dir) = open_temp().await;
        let work = db.tag_by_name("Work").await.unwrap().unwrap().id;
        let distraction = db.tag_by_name("Distraction").await.unwrap().unwrap().id;

        add_rule(
            &db,
            "any chrome",
            distraction,
            RuleDraft {
                priority: Some(10),
                process_pattern: Some("chrome.exe".into()),
                ..Default::default()
            },
        )
        .await;
        let docs_rule = add_rule(
            &db,
            "work docs",
            work,
            RuleDraft {
                priority: Some(60),
                url_pattern: Some("*docs.google.com*".into()),
                ..Default::default()
            },
        )
        .await;

        let engine = RuleEngine::new(db).await.unwrap();
        let (tag, rule) = engine
            .classify(&obs("chrome.exe", "Spec", Some("https://docs.google.com/doc/1")))
            .await
            .unwrap();
        assert_eq!(tag, work);
        assert_eq!(rule, Some(docs_rule));

        let (tag, _) = engine
            .classify(&obs("chrome.exe", "Feed", Some("https://example.com")))
            .await
            .unwrap();
        assert_eq!(tag, distraction);
    }

    #[tokio::test]
    async fn unmatched_observation_lands_on_unclassified() {
        let (db, _dir) = open_temp().await;
        let engine = RuleEngine::new(db.clone()).await.unwrap();
        let unclassified = db.tag_by_name(TAG_UNCLASSIFIED).await.unwrap().unwrap();

        let (tag, rule) = engine.classify(&obs("mystery.exe", "???", None)).await.unwrap();
        assert_eq!(tag, unclassified.id);
        assert_eq!(rule, None);
    }

    #[tokio::test]
    async fn missing_unclassified_tag_is_recreated() {
        let (db, _dir) = open_temp().await;
        let unclassified = db.tag_by_name(TAG_UNCLASSIFIED).await.unwrap().unwrap();
        db.delete_tag(unclassified.id).await.unwrap();

        let engine = RuleEngine::new(db.clone()).await.unwrap();
        let (tag, _) = engine.classify(&obs("mystery.exe", "???", None)).await.unwrap();

        let recreated = db.tag_by_name(TAG_UNCLASSIFIED).await.unwrap().unwrap();
        assert_eq!(tag, recreated.id);
    }

    #[tokio::test]
    async fn malformed_rule_degrades_to_skip() {
        let (db, _dir) = open_temp().await;
        let work = db.tag_by_name("Work").await.unwrap().unwrap().id;
        add_rule(
            &db,
            "broken",
            work,
            RuleDraft {
                priority: Some(200),
                process_pattern: Some("app[".into()),
                ..Default::default()
            },
        )
        .await;

        let engine = RuleEngine::new(db.clone()).await.unwrap();
        // The broken high-priority rule must not shadow the sentinel rules.
        let away = db.tag_by_name("Away").await.unwrap().unwrap().id;
        let (tag, _) = engine.classify(&Observation::locked()).await.unwrap();
        assert_eq!(tag, away);
    }

    #[tokio::test]
    async fn empty_slots_are_not_wildcards() {
        let (db, _dir) = open_temp().await;
        let work = db.tag_by_name("Work").await.unwrap().unwrap().id;
        // A rule whose only populated slot is a URL pattern must not match
        // an observation without a URL.
        add_rule(
            &db,
            "docs only",
            work,
            RuleDraft {
                priority: Some(60),
                url_pattern: Some("*docs.google.com*".into()),
                ..Default::default()
            },
        )
        .await;

        let engine = RuleEngine::new(db.clone()).await.unwrap();
        let unclassified = db.tag_by_name(TAG_UNCLASSIFIED).await.unwrap().unwrap().id;
        let (tag, _) = engine.classify(&obs("code.exe", "main.rs", None)).await.unwrap();
        assert_eq!(tag, unclassified);
    }

    #[tokio::test]
    async fn reload_swaps_snapshots_without_tearing() {
        let (db, _dir) = open_temp().await;
        let work = db.tag_by_name("Work").await.unwrap().unwrap().id;
        let engine = RuleEngine::new(db.clone()).await.unwrap();

        // Take a snapshot as an in-flight classification would.
        let before = engine.cache.load_full();

        add_rule(
            &db,
            "editor",
            work,
            RuleDraft {
                priority: Some(40),
                process_pattern: Some("code.exe".into()),
                ..Default::default()
            },
        )
        .await;
        engine.reload().await.unwrap();

        // The old snapshot is unchanged; the new one sees the added rule.
        assert_eq!(before.len(), 2);
        assert_eq!(engine.cache.load().len(), 3);
    }
}
