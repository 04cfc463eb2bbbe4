//! Component assembly and task supervision.
//!
//! Start order follows the dependency graph: staged restore → store →
//! classifiers → URL ingester → monitor loop. The HTTP router is handed
//! back to `main`, which owns the listener and the shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use vigil_config::{Config, Paths};
use vigil_core::engine::RuleEngine;
use vigil_core::focus::FocusEnforcer;
use vigil_core::ingest::UrlIngester;
use vigil_core::loggen::LogGenerator;
use vigil_core::monitor::MonitorEngine;
use vigil_core::notify::Notifier;
use vigil_core::probe::system_probe;
use vigil_core::transfer::{self, TransferManager};
use vigil_core::Database;

use super::app_state::AppState;

const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct App {
    pub state: AppState,
    pub exit_rx: watch::Receiver<bool>,
    monitor_task: JoinHandle<()>,
    ingester_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

/// Build every component and spawn the long-lived tasks.
pub async fn build(config: Config, paths: Paths) -> anyhow::Result<App> {
    paths.ensure_dirs().context("creating data directories")?;

    if transfer::apply_pending_restore(&paths)
        .await
        .context("applying staged restore")?
    {
        info!("staged database restore applied");
    }

    let db = Database::open(&paths.database())
        .await
        .context("opening activity store")?;

    let probe = system_probe();
    let engine = Arc::new(RuleEngine::new(db.clone()).await?);
    let enforcer = Arc::new(FocusEnforcer::new(db.clone(), probe.clone()).await?);
    let notifier = Arc::new(Notifier::new(db.clone()));
    let loggen = Arc::new(LogGenerator::new(db.clone(), paths.clone()));
    let transfer = Arc::new(TransferManager::new(db.clone(), paths.clone()));

    // Backfill text logs off the startup path.
    let backfill = loggen.clone();
    tokio::spawn(async move {
        if let Err(err) = backfill.update_all_logs().await {
            warn!(%err, "log backfill failed");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ingester = UrlIngester::new(config.ingest.port);
    let latest_url = ingester.latest();
    let ingester_task = tokio::spawn(ingester.run(shutdown_rx));

    let (monitor, monitor_handle) = MonitorEngine::new(
        db.clone(),
        engine.clone(),
        enforcer.clone(),
        notifier,
        probe,
        latest_url,
        Some(loggen.clone()),
    );
    let monitor_task = tokio::spawn(monitor.run());

    let (exit_tx, exit_rx) = watch::channel(false);

    let state = AppState {
        db,
        engine,
        enforcer,
        monitor: monitor_handle,
        transfer,
        loggen,
        paths,
        config: Arc::new(config),
        exit: exit_tx,
    };

    Ok(App {
        state,
        exit_rx,
        monitor_task,
        ingester_task,
        shutdown_tx,
    })
}

impl App {
    /// Cooperative teardown: stop the monitor (joining within a bounded
    /// timeout), then drop the ingester's listening socket.
    pub async fn shutdown(self) {
        self.state.monitor.signal_stop();
        if tokio::time::timeout(MONITOR_STOP_TIMEOUT, self.monitor_task)
            .await
            .is_err()
        {
            warn!("monitor loop did not stop in time; abandoning task");
        }

        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(Duration::from_secs(2), self.ingester_task)
            .await
            .is_err()
        {
            warn!("url ingester did not stop in time; abandoning task");
        }

        info!("daemon shut down");
    }
}
