//! Per-tag rate-limited desktop alerts.
//!
//! The cooldown ledger lives in memory and is stamped *before* the OS
//! call, so a slow or failing toast cannot open the floodgates. Delivery
//! runs on a fire-and-forget task; every failure is logged, none raised.

mod selection;
mod sound;

pub use selection::PlayMode;

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use vigil_model::{AssetId, SettingKey, Tag, TagId};

use crate::error::Result;
use crate::store::{AssetKind, Database};

/// Application-constant toast title.
pub const APP_NAME: &str = "Vigil";

pub struct Notifier {
    db: Database,
    last_fired: DashMap<TagId, Instant>,
    last_pick: DashMap<AssetKind, AssetId>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("tracked_tags", &self.last_fired.len())
            .finish()
    }
}

impl Notifier {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            last_fired: DashMap::new(),
            last_pick: DashMap::new(),
        }
    }

    /// Alert for the tag if its alert flag is on and the cooldown has
    /// elapsed. Returns whether a notification was dispatched.
    pub async fn maybe(&self, tag_id: TagId) -> Result<bool> {
        let Some(tag) = self.db.tag_by_id(tag_id).await? else {
            return Ok(false);
        };
        if !tag.alert_enabled || tag.is_reserved() {
            return Ok(false);
        }

        let cooldown = Duration::from_secs(tag.alert_cooldown.max(1) as u64);
        if !self.stamp(tag_id, cooldown) {
            debug!(%tag_id, "alert suppressed by cooldown");
            return Ok(false);
        }

        let toast_enabled = self.flag(SettingKey::AlertToastEnabled).await?;
        let sound = self.resolve_sound().await?;
        let image = self.resolve_image().await?;

        if !toast_enabled && sound.is_none() {
            return Ok(false);
        }

        let body = tag
            .alert_message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_body(&tag));

        tokio::spawn(async move {
            deliver(toast_enabled, body, sound, image);
        });
        Ok(true)
    }

    /// Check-and-stamp in one step; returns false while cooling down.
    fn stamp(&self, tag_id: TagId, cooldown: Duration) -> bool {
        use dashmap::mapref::entry::Entry;
        let now = Instant::now();
        match self.last_fired.entry(tag_id) {
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) < cooldown {
                    return false;
                }
                *occupied.get_mut() = now;
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    async fn flag(&self, key: SettingKey) -> Result<bool> {
        Ok(self.db.setting_or_default(key).await? == "1")
    }

    /// Resolve the sound to play, honouring mode `single`/`random` and the
    /// never-repeat rule for random with two or more assets.
    async fn resolve_sound(&self) -> Result<Option<std::path::PathBuf>> {
        if !self.flag(SettingKey::AlertSoundEnabled).await? {
            return Ok(None);
        }
        let assets = self.db.list_assets(AssetKind::Sound).await?;
        let mode = self.db.setting_or_default(SettingKey::AlertSoundMode).await?;
        let selected = self.db.setting_or_default(SettingKey::AlertSoundSelected).await?;
        let previous = self.last_pick.get(&AssetKind::Sound).map(|e| *e);

        let pick = selection::pick(&assets, PlayMode::parse(&mode), &selected, previous);
        if let Some(asset) = &pick {
            self.last_pick.insert(AssetKind::Sound, asset.id);
            return Ok(Some(std::path::PathBuf::from(&asset.file_path)));
        }
        // Sound is enabled but no asset is registered: the system beep
        // still fires in delivery.
        Ok(Some(std::path::PathBuf::new()))
    }

    async fn resolve_image(&self) -> Result<Option<std::path::PathBuf>> {
        if !self.flag(SettingKey::AlertImageEnabled).await? {
            return Ok(None);
        }
        let assets = self.db.list_assets(AssetKind::Image).await?;
        let mode = self.db.setting_or_default(SettingKey::AlertImageMode).await?;
        let selected = self.db.setting_or_default(SettingKey::AlertImageSelected).await?;
        let previous = self.last_pick.get(&AssetKind::Image).map(|e| *e);

        let pick = selection::pick(&assets, PlayMode::parse(&mode), &selected, previous);
        if let Some(asset) = &pick {
            self.last_pick.insert(AssetKind::Image, asset.id);
            return Ok(Some(std::path::PathBuf::from(&asset.file_path)));
        }
        Ok(None)
    }
}

fn default_body(tag: &Tag) -> String {
    format!("'{}' activity detected!", tag.name)
}

/// Actual OS delivery. Toast first (when compiled in and enabled), then
/// the custom sound. Failures downgrade: toast-off ⇒ sound-only ⇒ nothing.
fn deliver(
    toast_enabled: bool,
    body: String,
    sound: Option<std::path::PathBuf>,
    image: Option<std::path::PathBuf>,
) {
    if toast_enabled {
        show_toast(&body, image.as_deref());
    }
    if let Some(path) = sound {
        sound::play(&path);
    }
}

#[cfg(feature = "toast")]
fn show_toast(body: &str, image: Option<&std::path::Path>) {
    let mut toast = notify_rust::Notification::new();
    toast.summary(APP_NAME).body(body);
    if let Some(image) = image {
        debug!(path = %image.display(), "attaching hero image");
        toast.icon(&image.display().to_string());
    }
    if let Err(err) = toast.show() {
        tracing::error!(%err, "toast delivery failed");
    }
}

#[cfg(not(feature = "toast"))]
fn show_toast(body: &str, _image: Option<&std::path::Path>) {
    // Toast support not compiled in; the sound path still runs.
    debug!(%body, "toast skipped (no backend)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;
    use vigil_model::{TagCategory, TagDraft};

    async fn alerting_tag(db: &Database, name: &str, cooldown: i64) -> TagId {
        let id = db.create_tag(name, "#00AAFF", TagCategory::NonWork).await.unwrap();
        db.update_tag(
            id,
            &TagDraft {
                alert_enabled: Some(true),
                alert_cooldown: Some(cooldown),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn cooldown_suppresses_the_second_fire() {
        let (db, _dir) = open_temp().await;
        let tag = alerting_tag(&db, "Chatty", 30).await;
        let notifier = Notifier::new(db);

        assert!(notifier.maybe(tag).await.unwrap());
        assert!(!notifier.maybe(tag).await.unwrap());
    }

    #[tokio::test]
    async fn disabled_and_reserved_tags_never_fire() {
        let (db, _dir) = open_temp().await;
        let silent = db.create_tag("Silent", "#333333", TagCategory::Other).await.unwrap();
        let away = db.tag_by_name("Away").await.unwrap().unwrap();
        // Even a misconfigured alert flag on a reserved tag stays silent.
        db.update_tag(
            away.id,
            &TagDraft {
                alert_enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let notifier = Notifier::new(db);
        assert!(!notifier.maybe(silent).await.unwrap());
        assert!(!notifier.maybe(away.id).await.unwrap());
    }

    #[tokio::test]
    async fn toast_off_and_sound_off_means_no_dispatch() {
        let (db, _dir) = open_temp().await;
        db.set_setting("alert_toast_enabled", "0").await.unwrap();
        let tag = alerting_tag(&db, "Muted", 30).await;

        let notifier = Notifier::new(db);
        assert!(!notifier.maybe(tag).await.unwrap());
    }

    #[tokio::test]
    async fn custom_message_wins_over_template() {
        let (db, _dir) = open_temp().await;
        let tag_id = alerting_tag(&db, "Games", 30).await;
        db.update_tag(
            tag_id,
            &TagDraft {
                alert_message: Some("Back to work!".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let tag = db.tag_by_id(tag_id).await.unwrap().unwrap();
        assert_eq!(tag.alert_message.as_deref(), Some("Back to work!"));
        assert_eq!(default_body(&tag), "'Games' activity detected!");
    }
}
