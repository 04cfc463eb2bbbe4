use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Resolved on-disk layout of the daemon's persisted state.
///
/// Everything lives under one application-data directory: the SQLite store
/// (with its WAL sidecars), media assets, text activity logs, and the
/// staging files for deferred database restores.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Per-OS default: `<data_dir>/vigil` (e.g. `~/.local/share/vigil`).
    pub fn resolve(override_dir: Option<&Path>) -> Self {
        let root = match override_dir {
            Some(dir) => dir.to_owned(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vigil"),
        };
        Self { root }
    }

    pub fn from_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("activity_tracker.db")
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.root.join("sounds")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn daily_logs_dir(&self) -> PathBuf {
        self.root.join("activity_logs").join("daily")
    }

    pub fn monthly_logs_dir(&self) -> PathBuf {
        self.root.join("activity_logs").join("monthly")
    }

    pub fn recent_log(&self) -> PathBuf {
        self.root.join("activity_logs").join("recent.log")
    }

    pub fn restore_marker(&self) -> PathBuf {
        self.root.join("restore_pending.json")
    }

    pub fn restore_database(&self) -> PathBuf {
        self.root.join("restore_pending.db")
    }

    pub fn restore_media(&self) -> PathBuf {
        self.root.join("restore_pending_media.zip")
    }

    /// Create every directory the daemon writes into.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            self.root.clone(),
            self.sounds_dir(),
            self.images_dir(),
            self.daily_logs_dir(),
            self.monthly_logs_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_off_the_root() {
        let paths = Paths::from_root("/tmp/vigil-test");
        assert_eq!(
            paths.database(),
            PathBuf::from("/tmp/vigil-test/activity_tracker.db")
        );
        assert!(paths.daily_logs_dir().ends_with("activity_logs/daily"));
        assert!(paths.recent_log().ends_with("activity_logs/recent.log"));
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::from_root(dir.path().join("state"));
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.sounds_dir().is_dir());
        assert!(paths.monthly_logs_dir().is_dir());
    }
}
