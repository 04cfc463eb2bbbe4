//! Tag- and time-window-gated window minimisation.
//!
//! The enforcer never kills processes or steals focus; within an active
//! block window it only minimises the offending window, and it re-minimises
//! on every tick so re-opened windows go straight back down.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{Local, NaiveTime};
use tracing::{debug, info, warn};

use vigil_model::{BlockWindow, Tag, TagId, WindowHandle};

use crate::error::Result;
use crate::probe::Probe;
use crate::store::Database;

/// The tracker must never minimise itself or the toolchain that runs it
/// in development; a misconfigured rule would otherwise fight the user's
/// ability to fix it.
const NEVER_BLOCK: &[&str] = &["vigil-server.exe", "vigil-server", "vigil.exe", "cargo.exe", "cargo"];

/// True when mutating this tag's block configuration must be refused:
/// the tag is blocked and the wall clock sits inside its window.
pub fn block_update_forbidden(tag: &Tag, now: NaiveTime) -> bool {
    tag.block_enabled
        && tag
            .block_window()
            .map(|window| window.contains(now))
            .unwrap_or(false)
}

pub struct FocusEnforcer {
    db: Database,
    probe: Arc<dyn Probe>,
    blocked: ArcSwap<HashMap<TagId, BlockWindow>>,
}

impl std::fmt::Debug for FocusEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusEnforcer")
            .field("blocked_tags", &self.blocked.load().len())
            .finish()
    }
}

impl FocusEnforcer {
    pub async fn new(db: Database, probe: Arc<dyn Probe>) -> Result<Self> {
        let enforcer = Self {
            db,
            probe,
            blocked: ArcSwap::from_pointee(HashMap::new()),
        };
        enforcer.reload().await?;
        Ok(enforcer)
    }

    /// Rebuild the blocked-tag map from the tag table and swap it in
    /// atomically. Tags with the flag set but missing times are *not*
    /// blocked, and the reserved tags never are.
    pub async fn reload(&self) -> Result<()> {
        let tags = self.db.list_tags().await?;
        let mut blocked = HashMap::new();
        for tag in &tags {
            if !tag.block_enabled || tag.is_reserved() {
                continue;
            }
            match tag.block_window() {
                Some(window) => {
                    blocked.insert(tag.id, window);
                }
                None => {
                    debug!(tag = %tag.name, "block flag set without a usable window; not blocking");
                }
            }
        }
        debug!(count = blocked.len(), "focus block map reloaded");
        self.blocked.store(Arc::new(blocked));
        Ok(())
    }

    /// Whether the tag's window covers the given wall-clock time.
    pub fn is_blocked_at(&self, tag_id: TagId, now: NaiveTime) -> bool {
        self.blocked
            .load()
            .get(&tag_id)
            .map(|window| window.contains(now))
            .unwrap_or(false)
    }

    /// Minimise `hwnd` if the tag is currently blocked. Called on every
    /// tick, changed or not, so a re-opened window is re-minimised.
    pub fn consider(&self, tag_id: TagId, hwnd: Option<WindowHandle>, process_name: &str) {
        self.consider_at(tag_id, hwnd, process_name, Local::now().time());
    }

    fn consider_at(
        &self,
        tag_id: TagId,
        hwnd: Option<WindowHandle>,
        process_name: &str,
        now: NaiveTime,
    ) {
        let process_lower = process_name.to_lowercase();
        if NEVER_BLOCK.iter().any(|p| p.eq_ignore_ascii_case(&process_lower)) {
            return;
        }
        if !self.is_blocked_at(tag_id, now) {
            return;
        }
        let Some(hwnd) = hwnd else {
            return;
        };
        if self.probe.minimize_window(hwnd) {
            info!(%tag_id, %process_name, "minimised blocked window");
        } else {
            warn!(%tag_id, %process_name, "minimise call failed");
        }
    }
}
