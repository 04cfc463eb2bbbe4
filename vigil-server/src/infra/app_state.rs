use std::{fmt, sync::Arc};

use tokio::sync::watch;

use vigil_config::{Config, Paths};
use vigil_core::engine::RuleEngine;
use vigil_core::focus::FocusEnforcer;
use vigil_core::loggen::LogGenerator;
use vigil_core::monitor::MonitorHandle;
use vigil_core::transfer::TransferManager;
use vigil_core::Database;

/// Everything the handlers reach for. Module-level globals from earlier
/// drafts live here instead, passed to the router explicitly.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<RuleEngine>,
    pub enforcer: Arc<FocusEnforcer>,
    pub monitor: MonitorHandle,
    pub transfer: Arc<TransferManager>,
    pub loggen: Arc<LogGenerator>,
    pub paths: Paths,
    pub config: Arc<Config>,
    /// Flipped by the restore handler once a pending restore is staged;
    /// main shuts the process down so start-up can swap the database.
    pub exit: watch::Sender<bool>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Reload every rule-derived cache after a tag/rule mutation.
    pub async fn reload_classifiers(&self) -> vigil_core::Result<()> {
        self.engine.reload().await?;
        self.enforcer.reload().await?;
        Ok(())
    }

    pub fn request_exit(&self) {
        let _ = self.exit.send(true);
    }
}
