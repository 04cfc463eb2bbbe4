//! Import/export: rules as JSON, whole-database backups, and the staged
//! restore that replaces the live store on next start-up.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vigil_config::Paths;
use vigil_model::{split_alternates, Rule, RuleDraft, Tag, TagCategory, TagId};

use crate::error::{CoreError, Result};
use crate::store::Database;

const EXPORT_VERSION: &str = "1.0";
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Serialize)]
pub struct RulesExport {
    pub export_date: String,
    pub version: String,
    pub tags: Vec<Tag>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
pub struct RulesImport {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<ImportedTag>,
    #[serde(default)]
    pub rules: Vec<ImportedRule>,
}

#[derive(Debug, Deserialize)]
pub struct ImportedTag {
    pub id: i64,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub category: Option<TagCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ImportedRule {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub process_pattern: Option<String>,
    #[serde(default)]
    pub url_pattern: Option<String>,
    #[serde(default)]
    pub window_title_pattern: Option<String>,
    #[serde(default)]
    pub browser_profile: Option<String>,
    #[serde(default)]
    pub process_path_pattern: Option<String>,
    pub tag_id: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct ImportStats {
    pub tags_imported: u32,
    pub tags_existed: u32,
    pub rules_imported: u32,
    pub rules_deleted: u32,
    pub rules_merged: u32,
}

/// Marker describing a staged restore, applied on next start-up.
#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreMarker {
    pub staged_at: String,
    pub has_media: bool,
}

pub struct TransferManager {
    db: Database,
    paths: Paths,
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager").finish_non_exhaustive()
    }
}

impl TransferManager {
    pub fn new(db: Database, paths: Paths) -> Self {
        Self { db, paths }
    }

    // === rules ===

    pub async fn export_rules(&self) -> Result<RulesExport> {
        Ok(RulesExport {
            export_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: EXPORT_VERSION.to_owned(),
            tags: self.db.list_tags().await?,
            rules: self.db.list_rules(false).await?,
        })
    }

    /// Import tags and rules.
    ///
    /// Tags are matched by name and created when missing. With
    /// `merge_mode`, a rule matching an existing `(name, priority, tag)`
    /// triple has its pattern slots unioned; without it, every existing
    /// rule is deleted first.
    pub async fn import_rules(&self, data: RulesImport, merge_mode: bool) -> Result<ImportStats> {
        if let Some(version) = &data.version {
            if version != EXPORT_VERSION {
                return Err(CoreError::Validation(format!(
                    "unsupported rules export version {version}"
                )));
            }
        }

        let mut stats = ImportStats::default();
        let mut tag_mapping: HashMap<i64, TagId> = HashMap::new();

        for tag in &data.tags {
            match self.db.tag_by_name(&tag.name).await? {
                Some(existing) => {
                    tag_mapping.insert(tag.id, existing.id);
                    stats.tags_existed += 1;
                }
                None => {
                    let id = self
                        .db
                        .create_tag(&tag.name, &tag.color, tag.category.unwrap_or_default())
                        .await?;
                    tag_mapping.insert(tag.id, id);
                    stats.tags_imported += 1;
                }
            }
        }

        let mut existing_by_key: HashMap<(String, i64, TagId), Rule> = HashMap::new();
        if merge_mode {
            for rule in self.db.list_rules(false).await? {
                existing_by_key.insert((rule.name.clone(), rule.priority, rule.tag_id), rule);
            }
        } else {
            for rule in self.db.list_rules(false).await? {
                self.db.delete_rule(rule.id).await?;
                stats.rules_deleted += 1;
            }
        }

        for rule in &data.rules {
            let Some(&tag_id) = tag_mapping.get(&rule.tag_id) else {
                warn!(rule = %rule.name, tag_id = rule.tag_id, "skipping rule with unmapped tag");
                continue;
            };

            let key = (rule.name.clone(), rule.priority, tag_id);
            if let Some(existing) = merge_mode.then(|| existing_by_key.get(&key)).flatten() {
                let draft = RuleDraft {
                    enabled: Some(rule.enabled),
                    process_pattern: merged_or_cleared(
                        existing.process_pattern.as_deref(),
                        rule.process_pattern.as_deref(),
                    ),
                    url_pattern: merged_or_cleared(
                        existing.url_pattern.as_deref(),
                        rule.url_pattern.as_deref(),
                    ),
                    window_title_pattern: merged_or_cleared(
                        existing.window_title_pattern.as_deref(),
                        rule.window_title_pattern.as_deref(),
                    ),
                    process_path_pattern: merged_or_cleared(
                        existing.process_path_pattern.as_deref(),
                        rule.process_path_pattern.as_deref(),
                    ),
                    browser_profile: rule
                        .browser_profile
                        .clone()
                        .or_else(|| existing.browser_profile.clone()),
                    ..Default::default()
                };
                self.db.update_rule(existing.id, &draft).await?;
                stats.rules_merged += 1;
            } else {
                let draft = RuleDraft {
                    priority: Some(rule.priority),
                    enabled: Some(rule.enabled),
                    process_pattern: rule.process_pattern.clone(),
                    url_pattern: rule.url_pattern.clone(),
                    window_title_pattern: rule.window_title_pattern.clone(),
                    browser_profile: rule.browser_profile.clone(),
                    process_path_pattern: rule.process_path_pattern.clone(),
                    ..Default::default()
                };
                self.db.create_rule(&rule.name, tag_id, &draft).await?;
                stats.rules_imported += 1;
            }
        }

        info!(?stats, "rules import finished");
        Ok(stats)
    }

    // === database backup ===

    /// Write a consistent snapshot of the live database to `dest` and
    /// verify its integrity before handing it out.
    pub async fn backup_database(&self, dest: &Path) -> Result<()> {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }
        let dest_str = dest.to_string_lossy().into_owned();
        sqlx::query("VACUUM INTO ?")
            .bind(dest_str)
            .execute(self.db.pool())
            .await?;

        let snapshot = Database::connect(dest).await?;
        let verdict = snapshot.check_integrity().await;
        snapshot.close().await;
        verdict
    }

    /// Snapshot plus the sounds/ and images/ directories, zipped.
    pub async fn backup_with_media(&self, dest: &Path) -> Result<()> {
        let snapshot_path = dest.with_extension("snapshot.db");
        self.backup_database(&snapshot_path).await?;

        let result = self.write_media_zip(dest, &snapshot_path);
        let _ = std::fs::remove_file(&snapshot_path);
        result
    }

    fn write_media_zip(&self, dest: &Path, snapshot: &Path) -> Result<()> {
        let file = std::fs::File::create(dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        zip.start_file("activity_tracker.db", options)?;
        zip.write_all(&std::fs::read(snapshot)?)?;

        for (prefix, dir) in [
            ("sounds", self.paths.sounds_dir()),
            ("images", self.paths.images_dir()),
        ] {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let name = entry.file_name();
                zip.start_file(
                    format!("{prefix}/{}", name.to_string_lossy()),
                    options,
                )?;
                zip.write_all(&std::fs::read(&path)?)?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    // === restore staging ===

    /// Validate an uploaded database and stage it for the next start-up.
    /// The live database is not touched here; the caller signals process
    /// exit once staging succeeds.
    pub async fn stage_restore(&self, db_bytes: &[u8], media_zip: Option<&[u8]>) -> Result<()> {
        if !db_bytes.starts_with(SQLITE_MAGIC) {
            return Err(CoreError::Validation(
                "upload is not a SQLite database".into(),
            ));
        }

        let pending_db = self.paths.restore_database();
        std::fs::write(&pending_db, db_bytes)?;

        let verdict = match Database::connect(&pending_db).await {
            Ok(staged) => {
                let verdict = staged.check_integrity().await;
                staged.close().await;
                verdict
            }
            Err(err) => Err(err),
        };
        if let Err(err) = verdict {
            let _ = std::fs::remove_file(&pending_db);
            return Err(err);
        }

        let has_media = match media_zip {
            Some(bytes) => {
                std::fs::write(self.paths.restore_media(), bytes)?;
                true
            }
            None => false,
        };

        let marker = RestoreMarker {
            staged_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            has_media,
        };
        std::fs::write(
            self.paths.restore_marker(),
            serde_json::to_vec_pretty(&marker)?,
        )?;

        info!("database restore staged; restart to apply");
        Ok(())
    }
}

/// Apply a staged restore, if any. Runs before the store opens; returns
/// whether the live database was replaced.
pub async fn apply_pending_restore(paths: &Paths) -> Result<bool> {
    let marker_path = paths.restore_marker();
    if !marker_path.exists() {
        return Ok(false);
    }

    let marker: RestoreMarker = serde_json::from_slice(&std::fs::read(&marker_path)?)?;
    let pending_db = paths.restore_database();

    let cleanup = |paths: &Paths| {
        let _ = std::fs::remove_file(paths.restore_marker());
        let _ = std::fs::remove_file(paths.restore_database());
        let _ = std::fs::remove_file(paths.restore_media());
    };

    if !pending_db.exists() {
        warn!("restore marker without staged database; ignoring");
        cleanup(paths);
        return Ok(false);
    }

    // Never replace a good database with a bad upload, even if the file
    // was tampered with between staging and restart.
    let verdict = match Database::connect(&pending_db).await {
        Ok(staged) => {
            let verdict = staged.check_integrity().await;
            staged.close().await;
            verdict
        }
        Err(err) => Err(err),
    };
    if let Err(err) = verdict {
        warn!(%err, "staged database failed validation; keeping the live one");
        cleanup(paths);
        return Ok(false);
    }

    let live = paths.database();
    for sidecar in ["-wal", "-shm"] {
        let mut os = live.clone().into_os_string();
        os.push(sidecar);
        let _ = std::fs::remove_file(std::path::PathBuf::from(os));
    }
    std::fs::copy(&pending_db, &live)?;

    if marker.has_media {
        if let Err(err) = extract_media(paths) {
            warn!(%err, "media archive extraction failed");
        }
    }

    cleanup(paths);
    info!(staged_at = %marker.staged_at, "applied staged database restore");
    Ok(true)
}

fn extract_media(paths: &Paths) -> Result<()> {
    let file = std::fs::File::open(paths.restore_media())?;
    let mut archive = zip::ZipArchive::new(file)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let allowed = relative.starts_with("sounds") || relative.starts_with("images");
        if !allowed || entry.is_dir() {
            continue;
        }
        let target = paths.root().join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Union of two comma-separated slots, preserving first-seen order.
fn merged_or_cleared(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let mut combined: Vec<&str> = Vec::new();
    for slot in [existing, incoming].into_iter().flatten() {
        for alternate in split_alternates(slot) {
            if !combined.contains(&alternate) {
                combined.push(alternate);
            }
        }
    }
    if combined.is_empty() {
        None
    } else {
        Some(combined.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;
    use vigil_model::TagCategory;

    fn patterns(rule: &Rule) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
        (
            rule.process_pattern.clone(),
            rule.url_pattern.clone(),
            rule.window_title_pattern.clone(),
            rule.process_path_pattern.clone(),
        )
    }

    async fn seeded_transfer() -> (TransferManager, Database, tempfile::TempDir) {
        let (db, dir) = open_temp().await;
        let paths = Paths::from_root(dir.path().join("state"));
        paths.ensure_dirs().unwrap();
        (TransferManager::new(db.clone(), paths), db, dir)
    }

    #[tokio::test]
    async fn export_then_merge_import_round_trips() {
        let (source_mgr, source_db, _dir) = seeded_transfer().await;
        let chat = source_db
            .create_tag("Chat", "#2196F3", TagCategory::NonWork)
            .await
            .unwrap();
        source_db
            .create_rule(
                "slack",
                chat,
                &RuleDraft {
                    priority: Some(50),
                    url_pattern: Some("*slack.com*".into()),
                    process_pattern: Some("slack.exe".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let export = source_mgr.export_rules().await.unwrap();
        let json = serde_json::to_string(&export).unwrap();

        let (dest_mgr, dest_db, _dir2) = seeded_transfer().await;
        let parsed: RulesImport = serde_json::from_str(&json).unwrap();
        let stats = dest_mgr.import_rules(parsed, true).await.unwrap();

        // Reserved + example tags already exist on the fresh store.
        assert_eq!(stats.tags_imported, 1);
        assert_eq!(stats.tags_existed, 4);
        // The two sentinel rules merge into the seeded ones.
        assert_eq!(stats.rules_merged, 2);
        assert_eq!(stats.rules_imported, 1);

        let source_rules = source_db.list_rules(false).await.unwrap();
        let dest_rules = dest_db.list_rules(false).await.unwrap();
        let shape = |rules: &[Rule]| {
            let mut v: Vec<_> = rules
                .iter()
                .map(|r| (r.name.clone(), r.priority, r.tag_name.clone(), patterns(r)))
                .collect();
            v.sort();
            v
        };
        assert_eq!(shape(&source_rules), shape(&dest_rules));
    }

    #[tokio::test]
    async fn merge_unions_pattern_alternates() {
        assert_eq!(
            merged_or_cleared(Some("chrome.exe, firefox.exe"), Some("firefox.exe,msedge.exe")),
            Some("chrome.exe,firefox.exe,msedge.exe".into())
        );
        assert_eq!(merged_or_cleared(None, None), None);
        assert_eq!(
            merged_or_cleared(Some("a.exe"), None),
            Some("a.exe".into())
        );
    }

    #[tokio::test]
    async fn replace_mode_deletes_existing_rules_first() {
        let (mgr, db, _dir) = seeded_transfer().await;
        let import = RulesImport {
            version: Some("1.0".into()),
            tags: vec![ImportedTag {
                id: 1,
                name: "Imported".into(),
                color: "#101010".into(),
                category: None,
            }],
            rules: vec![ImportedRule {
                name: "only rule".into(),
                priority: 5,
                enabled: true,
                process_pattern: Some("only.exe".into()),
                url_pattern: None,
                window_title_pattern: None,
                browser_profile: None,
                process_path_pattern: None,
                tag_id: 1,
            }],
        };

        let stats = mgr.import_rules(import, false).await.unwrap();
        assert_eq!(stats.rules_deleted, 2);
        assert_eq!(stats.rules_imported, 1);

        let rules = db.list_rules(false).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "only rule");
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let (mgr, _db, _dir) = seeded_transfer().await;
        let import = RulesImport {
            version: Some("2.0".into()),
            tags: vec![],
            rules: vec![],
        };
        assert!(mgr.import_rules(import, true).await.is_err());
    }

    #[tokio::test]
    async fn backup_produces_an_openable_snapshot() {
        let (mgr, db, dir) = seeded_transfer().await;
        db.create_tag("Snapshot", "#424242", TagCategory::Other).await.unwrap();

        let dest = dir.path().join("backup.db");
        mgr.backup_database(&dest).await.unwrap();

        let snapshot = Database::open(&dest).await.unwrap();
        let tag = snapshot.tag_by_name("Snapshot").await.unwrap();
        assert!(tag.is_some());
        snapshot.close().await;
    }

    #[tokio::test]
    async fn garbage_uploads_never_stage() {
        let (mgr, _db, dir) = seeded_transfer().await;
        let err = mgr.stage_restore(b"definitely not sqlite", None).await;
        assert!(err.is_err());

        let paths = Paths::from_root(dir.path().join("state"));
        assert!(!paths.restore_marker().exists());
        assert!(!paths.restore_database().exists());
    }

    #[tokio::test]
    async fn staged_restore_is_applied_on_next_startup() {
        let (mgr, db, dir) = seeded_transfer().await;
        db.create_tag("Carried", "#010101", TagCategory::Other).await.unwrap();

        // Snapshot the current store and stage it into a second data dir.
        let snapshot = dir.path().join("upload.db");
        mgr.backup_database(&snapshot).await.unwrap();
        let bytes = std::fs::read(&snapshot).unwrap();

        let target_root = dir.path().join("other-state");
        let target = Paths::from_root(&target_root);
        target.ensure_dirs().unwrap();
        let live = Database::open(&target.database()).await.unwrap();
        assert!(live.tag_by_name("Carried").await.unwrap().is_none());
        live.close().await;

        let staging = TransferManager::new(Database::open(&target.database()).await.unwrap(), target.clone());
        staging.stage_restore(&bytes, None).await.unwrap();
        staging.db.close().await;

        assert!(apply_pending_restore(&target).await.unwrap());
        assert!(!target.restore_marker().exists());

        let restored = Database::open(&target.database()).await.unwrap();
        assert!(restored.tag_by_name("Carried").await.unwrap().is_some());
        restored.close().await;
    }

    #[tokio::test]
    async fn no_marker_means_no_restore() {
        let (_mgr, _db, dir) = seeded_transfer().await;
        let paths = Paths::from_root(dir.path().join("state"));
        assert!(!apply_pending_restore(&paths).await.unwrap());
    }
}
