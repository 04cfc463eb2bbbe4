//! The sampling state machine.
//!
//! One periodic driver merges three asynchronous signals — foreground
//! window, idle/lock state, and the latest browser frame — into the
//! activity stream: unchanged samples extend the open interval, changed
//! samples close it and open the next one. A tick failure is logged and
//! the loop sleeps one fallback period; it never terminates on a
//! recoverable error.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use vigil_model::{
    ActivityId, ActivityUpdate, Observation, SettingKey, Settings, TagId, WindowHandle,
};

use crate::engine::RuleEngine;
use crate::error::Result;
use crate::focus::FocusEnforcer;
use crate::ingest::LatestFrame;
use crate::loggen::LogGenerator;
use crate::notify::Notifier;
use crate::probe::Probe;
use crate::store::Database;

const PAUSE_POLL: Duration = Duration::from_millis(500);
const FALLBACK_SLEEP: Duration = Duration::from_secs(2);
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Control surface the façade holds onto: pause/resume/stop signals, the
/// db-release handshake used before restores, and the activity broadcast.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    pause: watch::Sender<bool>,
    db_close: mpsc::Sender<oneshot::Sender<()>>,
    updates: broadcast::Sender<ActivityUpdate>,
}

impl MonitorHandle {
    pub fn pause(&self) {
        info!("monitor pause requested");
        self.pause.send_replace(true);
    }

    pub fn resume(&self) {
        info!("monitor resume requested");
        self.pause.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    /// Signal the loop to stop. The caller joins the task itself, bounded
    /// by its own timeout; an unjoined task is abandoned to process exit.
    pub fn signal_stop(&self) {
        info!("monitor stop requested");
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Ask the (paused) loop to release its store handle. Returns whether
    /// the loop acknowledged within the timeout.
    pub async fn request_db_close(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.db_close.send(ack_tx).await.is_err() {
            return false;
        }
        matches!(tokio::time::timeout(timeout, ack_rx).await, Ok(Ok(())))
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<ActivityUpdate> {
        self.updates.subscribe()
    }
}

pub struct MonitorEngine {
    db: Database,
    engine: Arc<RuleEngine>,
    enforcer: Arc<FocusEnforcer>,
    notifier: Arc<Notifier>,
    probe: Arc<dyn Probe>,
    latest_url: LatestFrame,
    loggen: Option<Arc<LogGenerator>>,

    updates: broadcast::Sender<ActivityUpdate>,
    stop: watch::Receiver<bool>,
    pause: watch::Receiver<bool>,
    db_close: mpsc::Receiver<oneshot::Sender<()>>,

    last_observation: Option<Observation>,
    current_activity: Option<ActivityId>,
    current_tag: Option<TagId>,
    current_hwnd: Option<WindowHandle>,
    current_date: NaiveDate,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("current_activity", &self.current_activity)
            .field("current_tag", &self.current_tag)
            .finish_non_exhaustive()
    }
}

impl MonitorEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        engine: Arc<RuleEngine>,
        enforcer: Arc<FocusEnforcer>,
        notifier: Arc<Notifier>,
        probe: Arc<dyn Probe>,
        latest_url: LatestFrame,
        loggen: Option<Arc<LogGenerator>>,
    ) -> (Self, MonitorHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (pause_tx, pause_rx) = watch::channel(false);
        let (db_close_tx, db_close_rx) = mpsc::channel(1);
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let handle = MonitorHandle {
            stop: stop_tx,
            pause: pause_tx,
            db_close: db_close_tx,
            updates: updates_tx.clone(),
        };

        let engine = Self {
            db,
            engine,
            enforcer,
            notifier,
            probe,
            latest_url,
            loggen,
            updates: updates_tx,
            stop: stop_rx,
            pause: pause_rx,
            db_close: db_close_rx,
            last_observation: None,
            current_activity: None,
            current_tag: None,
            current_hwnd: None,
            current_date: Local::now().date_naive(),
        };

        (engine, handle)
    }

    /// The loop body. Runs until the stop signal flips, closing the open
    /// activity on the way out.
    pub async fn run(mut self) {
        info!("monitor loop started");
        while !*self.stop.borrow() {
            if *self.pause.borrow() {
                self.idle_paused().await;
                continue;
            }

            let interval = match self.tick().await {
                Ok(interval) => interval,
                Err(err) => {
                    error!(%err, "monitor tick failed");
                    FALLBACK_SLEEP
                }
            };
            self.sleep(interval).await;
        }

        self.close_current().await;
        info!("monitor loop stopped");
    }

    /// While paused: close whatever is open, serve db-release requests,
    /// and otherwise idle.
    async fn idle_paused(&mut self) {
        self.close_current().await;

        tokio::select! {
            request = self.db_close.recv() => {
                if let Some(ack) = request {
                    info!("releasing store handle for restore");
                    self.db.close().await;
                    let _ = ack.send(());
                }
            }
            _ = tokio::time::sleep(PAUSE_POLL) => {}
            _ = self.stop.changed() => {}
            _ = self.pause.changed() => {}
        }
    }

    async fn sleep(&mut self, interval: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.stop.changed() => {}
            _ = self.pause.changed() => {}
        }
    }

    /// One sampling step. Returns the interval to sleep before the next.
    async fn tick(&mut self) -> Result<Duration> {
        let interval = Duration::from_secs(Settings::parse_seconds(
            self.db.setting(SettingKey::PollingInterval.as_str()).await?,
            SettingKey::PollingInterval,
        ));

        self.check_date_change();

        let sample = self.collect_sample().await?;
        let changed = self
            .last_observation
            .as_ref()
            .map(|last| sample.differs_from(last))
            .unwrap_or(true);

        if changed {
            self.close_current().await;
            self.open_activity(&sample).await?;
            self.last_observation = Some(sample);
        } else if let Some(tag_id) = self.current_tag {
            // Same activity: the cooldown decides on re-alerting, and the
            // enforcer re-minimises a window the user re-opened.
            if let Err(err) = self.notifier.maybe(tag_id).await {
                warn!(%err, "alert check failed");
            }
            self.enforcer
                .consider(tag_id, sample.hwnd, &sample.process_name);
            self.current_hwnd = sample.hwnd;
        }

        Ok(interval)
    }

    /// Build the tick's sample: lock state first, then the idle threshold,
    /// then the foreground window with optional browser-frame enrichment.
    async fn collect_sample(&self) -> Result<Observation> {
        if self.probe.is_locked() {
            return Ok(Observation::locked());
        }

        let idle_threshold = Settings::parse_seconds(
            self.db.setting(SettingKey::IdleThreshold.as_str()).await?,
            SettingKey::IdleThreshold,
        ) as f64;
        if self.probe.idle_seconds() > idle_threshold {
            return Ok(Observation::idle());
        }

        let Some(window) = self.probe.active_window() else {
            return Ok(Observation::unknown());
        };

        let mut browser_url = None;
        let mut browser_profile = window.browser_profile.clone();
        if window.process_name.to_lowercase().contains("chrome") {
            if let Some(frame) = self.latest_url.get() {
                // Guard against frames for a background tab: the extension
                // title must appear in the actually-active window title.
                if !frame.title.is_empty() && !window.window_title.contains(&frame.title) {
                    debug!(frame_title = %frame.title, "discarding stale browser frame");
                } else {
                    browser_url = Some(frame.url);
                    if frame.profile.is_some() {
                        browser_profile = frame.profile;
                    }
                }
            }
        }

        Ok(Observation {
            process_name: window.process_name,
            window_title: window.window_title,
            browser_url,
            browser_profile,
            process_path: window.process_path,
            hwnd: Some(window.hwnd),
        })
    }

    async fn open_activity(&mut self, sample: &Observation) -> Result<()> {
        let (tag_id, rule_id) = self.engine.classify(sample).await?;
        let activity_id = self
            .db
            .create_activity(sample, Some(tag_id), rule_id)
            .await?;

        self.current_activity = Some(activity_id);
        self.current_tag = Some(tag_id);
        self.current_hwnd = sample.hwnd;

        debug!(
            %activity_id,
            process = %sample.process_name,
            title = %sample.window_title,
            "activity opened"
        );

        let tag_name = self
            .db
            .tag_by_id(tag_id)
            .await?
            .map(|tag| tag.name);
        let _ = self.updates.send(ActivityUpdate {
            activity_id,
            process_name: sample.process_name.clone(),
            window_title: sample.window_title.clone(),
            browser_url: sample.browser_url.clone(),
            browser_profile: sample.browser_profile.clone(),
            tag_id: Some(tag_id),
            tag_name,
            started_at: Local::now().naive_local(),
        });

        if let Err(err) = self.notifier.maybe(tag_id).await {
            warn!(%err, "alert check failed");
        }
        self.enforcer
            .consider(tag_id, sample.hwnd, &sample.process_name);
        Ok(())
    }

    async fn close_current(&mut self) {
        if let Some(activity_id) = self.current_activity.take() {
            if let Err(err) = self.db.end_activity(activity_id).await {
                warn!(%activity_id, %err, "failed to close activity");
            } else {
                debug!(%activity_id, "activity closed");
            }
            self.current_tag = None;
            self.current_hwnd = None;
            // Without an open activity the previous sample must not
            // suppress the next open (pause → resume on the same window).
            self.last_observation = None;
        }
    }

    /// On a date rollover, generate yesterday's daily log off-loop.
    fn check_date_change(&mut self) {
        let today = Local::now().date_naive();
        if today == self.current_date {
            return;
        }
        let yesterday = self.current_date;
        self.current_date = today;
        info!(%yesterday, %today, "date changed");

        if let Some(loggen) = self.loggen.clone() {
            tokio::spawn(async move {
                if let Err(err) = loggen.save_daily_log(yesterday).await {
                    warn!(%err, "daily log generation failed");
                }
                if let Err(err) = loggen.generate_recent_log().await {
                    warn!(%err, "recent log generation failed");
                }
            });
        }
    }
}
