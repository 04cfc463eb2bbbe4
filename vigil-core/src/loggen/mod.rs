//! Plain-text activity summaries for humans (and their LLMs).
//!
//! One file per day under `activity_logs/daily/`, a rolling
//! `recent.log` covering the retention window, and monthly archives.
//! Generation runs off the monitor loop on date rollover and is also
//! backfilled at start-up.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::info;

use vigil_config::Paths;
use vigil_model::{DomainSlice, TimelineRow, SettingKey, TAG_AWAY, TAG_UNCLASSIFIED};
use vigil_model::{PROCESS_IDLE, PROCESS_LOCKED};

use crate::error::Result;
use crate::store::{Database, UrlUsage};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MIN_AWAY_SECONDS: f64 = 300.0;

/// First/last activity, active total and tag-switch count for one day.
/// Shared between the daily log and the dashboard summary.
#[derive(Debug, Clone, Default)]
pub struct DaySummary {
    pub first: Option<NaiveTime>,
    pub last: Option<NaiveTime>,
    pub active_seconds: f64,
    pub tag_switches: i64,
}

/// Compute the day summary from chronologically sorted rows.
pub fn summarize(rows: &[TimelineRow], now: NaiveDateTime) -> DaySummary {
    let mut summary = DaySummary {
        first: rows.first().map(|r| r.start_time.time()),
        last: rows.last().map(|r| r.start_time.time()),
        ..Default::default()
    };

    for row in rows {
        if !is_sentinel(row) {
            summary.active_seconds += row_seconds(row, now);
        }
    }

    let mut previous = None;
    for row in rows {
        if previous.is_some() && row.tag_id != previous {
            summary.tag_switches += 1;
        }
        previous = row.tag_id;
    }
    summary
}

/// `www.`-stripped host of a URL.
pub fn domain_of(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_owned())
}

/// Collapse per-URL usage into per-domain slices, heaviest first.
pub fn aggregate_domains(usage: &[UrlUsage]) -> Vec<DomainSlice> {
    let mut by_domain: BTreeMap<String, f64> = BTreeMap::new();
    for row in usage {
        if let Some(domain) = domain_of(&row.browser_url) {
            *by_domain.entry(domain).or_default() += row.total_seconds;
        }
    }
    let mut slices: Vec<DomainSlice> = by_domain
        .into_iter()
        .map(|(domain, total_seconds)| DomainSlice {
            domain,
            total_seconds,
        })
        .collect();
    slices.sort_by(|a, b| b.total_seconds.total_cmp(&a.total_seconds));
    slices
}

fn is_sentinel(row: &TimelineRow) -> bool {
    matches!(
        row.process_name.as_deref(),
        Some(PROCESS_IDLE) | Some(PROCESS_LOCKED)
    )
}

fn row_seconds(row: &TimelineRow, now: NaiveDateTime) -> f64 {
    let end = row.end_time.unwrap_or(now);
    (end - row.start_time).num_milliseconds() as f64 / 1000.0
}

fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as i64;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub struct LogGenerator {
    db: Database,
    paths: Paths,
}

impl std::fmt::Debug for LogGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGenerator").finish_non_exhaustive()
    }
}

impl LogGenerator {
    pub fn new(db: Database, paths: Paths) -> Self {
        Self { db, paths }
    }

    async fn retention_days(&self) -> Result<i64> {
        let raw = self
            .db
            .setting_or_default(SettingKey::LogRetentionDays)
            .await?;
        Ok(raw.parse().unwrap_or(30))
    }

    /// Render one day. Keeps the format line-oriented and dense so weeks
    /// of history stay small enough to paste anywhere.
    pub async fn generate_daily_log(&self, date: NaiveDate) -> Result<String> {
        let start = date.and_time(NaiveTime::MIN);
        let end = start + Duration::days(1);
        let now = Local::now().naive_local();

        let mut rows = self.db.list_activities(start, end, None, None).await?;
        rows.sort_by_key(|r| (r.start_time, r.id.as_i64()));

        let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
        if rows.is_empty() {
            return Ok(format!("{date} ({weekday}) - no activity\n"));
        }

        let mut lines = Vec::new();
        lines.push(format!("--- {date} ({weekday}) ---"));

        let summary = summarize(&rows, now);
        lines.push(format!(
            "[summary] first:{} last:{} active:{} switches:{}",
            summary.first.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into()),
            summary.last.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into()),
            format_duration(summary.active_seconds),
            summary.tag_switches
        ));

        let tag_stats = self.db.stats_by_tag(start, end).await?;
        let active: Vec<_> = tag_stats.iter().filter(|t| t.tag_name != TAG_AWAY).collect();
        if !active.is_empty() {
            let total: f64 = active.iter().map(|t| t.total_seconds).sum();
            let parts: Vec<String> = active
                .iter()
                .map(|t| {
                    let pct = if total > 0.0 { t.total_seconds / total * 100.0 } else { 0.0 };
                    format!("{}:{}({:.0}%)", t.tag_name, format_duration(t.total_seconds), pct)
                })
                .collect();
            lines.push(format!("[tags] {}", parts.join(" ")));
        }

        let processes = self.db.stats_by_process(start, end, 10).await?;
        if !processes.is_empty() {
            let parts: Vec<String> = processes
                .iter()
                .map(|p| format!("{}:{}", p.process_name, format_duration(p.total_seconds)))
                .collect();
            lines.push(format!("[processes] {}", parts.join(" ")));
        }

        let domains = aggregate_domains(&self.db.url_usage(start, end).await?);
        if !domains.is_empty() {
            let parts: Vec<String> = domains
                .iter()
                .take(7)
                .map(|d| format!("{}:{}", d.domain, format_duration(d.total_seconds)))
                .collect();
            lines.push(format!("[domains] {}", parts.join(" ")));
        }

        let details = activity_details(&rows, now);
        if !details.is_empty() {
            let parts: Vec<String> = details
                .iter()
                .take(10)
                .map(|(title, tag, secs)| {
                    let short: String = if title.chars().count() > 40 {
                        title.chars().take(40).collect::<String>() + "..."
                    } else {
                        title.clone()
                    };
                    format!("\"{short}\"({tag}):{}", format_duration(*secs))
                })
                .collect();
            lines.push(format!("[activities] {}", parts.join(" ")));
        }

        let dayparts = daypart_distribution(&rows, now);
        if !dayparts.is_empty() {
            let parts: Vec<String> = dayparts
                .iter()
                .map(|(period, tags)| {
                    let inner: Vec<String> = tags
                        .iter()
                        .map(|(tag, secs)| format!("{tag}{}", format_duration(*secs)))
                        .collect();
                    format!("{period}:{}", inner.join(","))
                })
                .collect();
            lines.push(format!("[dayparts] {}", parts.join(" ")));
        }

        let away = away_records(&rows, now);
        if !away.is_empty() {
            let total: f64 = away.iter().map(|(_, _, s)| s).sum();
            let mut parts: Vec<String> = away
                .iter()
                .take(5)
                .map(|(from, to, secs)| format!("{from}-{to}({})", format_duration(*secs)))
                .collect();
            if away.len() > 5 {
                parts.push(format!("+{} more", away.len() - 5));
            }
            parts.push(format!("total:{}", format_duration(total)));
            lines.push(format!("[away] {}", parts.join(" ")));
        }

        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    pub async fn save_daily_log(&self, date: NaiveDate) -> Result<PathBuf> {
        let content = self.generate_daily_log(date).await?;
        let path = self.paths.daily_logs_dir().join(format!("{date}.log"));
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    /// Rebuild `recent.log`: the last `log_retention_days` days, newest
    /// first, yesterday inclusive.
    pub async fn generate_recent_log(&self) -> Result<PathBuf> {
        let retention = self.retention_days().await?;
        let today = Local::now().date_naive();

        let mut sections = Vec::new();
        sections.push(format!(
            "=== last {retention} days of activity (generated {}) ===",
            Local::now().format("%Y-%m-%d %H:%M")
        ));
        for offset in 1..=retention {
            let date = today - Duration::days(offset);
            sections.push(self.generate_daily_log(date).await?);
        }

        let path = self.paths.recent_log();
        tokio::fs::write(&path, sections.join("\n")).await?;
        Ok(path)
    }

    pub async fn generate_monthly_log(&self, year: i32, month: u32) -> Result<PathBuf> {
        let today = Local::now().date_naive();
        let mut sections = Vec::new();
        sections.push(format!("=== {year}-{month:02} monthly activity ==="));

        let mut date = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| crate::error::CoreError::Validation(format!("bad month {year}-{month}")))?;
        while date.month() == month && date < today {
            sections.push(self.generate_daily_log(date).await?);
            date += Duration::days(1);
        }

        let path = self
            .paths
            .monthly_logs_dir()
            .join(format!("{year}-{month:02}.log"));
        tokio::fs::write(&path, sections.join("\n")).await?;
        Ok(path)
    }

    /// Start-up backfill: missing dailies, the recent window, the current
    /// month, and the previous month just after rollover.
    pub async fn update_all_logs(&self) -> Result<()> {
        let retention = self.retention_days().await?;
        let today = Local::now().date_naive();

        for offset in 1..=retention {
            let date = today - Duration::days(offset);
            let path = self.paths.daily_logs_dir().join(format!("{date}.log"));
            if !path.exists() {
                self.save_daily_log(date).await?;
            }
        }

        self.generate_recent_log().await?;
        self.generate_monthly_log(today.year(), today.month()).await?;

        if today.day() <= 3 {
            let last_of_prev = today.with_day(1).unwrap_or(today) - Duration::days(1);
            self.generate_monthly_log(last_of_prev.year(), last_of_prev.month())
                .await?;
        }

        info!("activity logs refreshed");
        Ok(())
    }

    /// Prepend an emergency-reset record to `recent.log`.
    pub async fn log_emergency_reset(&self, cleared: &[String], reason: &str) -> Result<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!(
            "[emergency-reset] {stamp}\ncleared tags: {}\nreason: {reason}\n\n",
            if cleared.is_empty() {
                "none".to_owned()
            } else {
                cleared.join(", ")
            }
        );

        let path = self.paths.recent_log();
        let existing = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        tokio::fs::write(&path, entry + &existing).await?;
        Ok(())
    }
}

/// Seconds per (title, tag), heaviest first.
fn activity_details(rows: &[TimelineRow], now: NaiveDateTime) -> Vec<(String, String, f64)> {
    let mut stats: BTreeMap<(String, String), f64> = BTreeMap::new();
    for row in rows {
        if is_sentinel(row) {
            continue;
        }
        let title = row
            .window_title
            .clone()
            .or_else(|| row.process_name.clone())
            .unwrap_or_else(|| "Unknown".into());
        let tag = row
            .tag_name
            .clone()
            .unwrap_or_else(|| TAG_UNCLASSIFIED.into());
        *stats.entry((title, tag)).or_default() += row_seconds(row, now);
    }
    let mut details: Vec<(String, String, f64)> = stats
        .into_iter()
        .map(|((title, tag), secs)| (title, tag, secs))
        .collect();
    details.sort_by(|a, b| b.2.total_cmp(&a.2));
    details
}

/// Seconds per tag within the four parts of the day, keyed off each
/// activity's start hour. Away time is skipped.
fn daypart_distribution(
    rows: &[TimelineRow],
    now: NaiveDateTime,
) -> Vec<(&'static str, Vec<(String, f64)>)> {
    const PERIODS: [(&str, u32, u32); 4] = [
        ("morning (06-12)", 6, 12),
        ("afternoon (12-18)", 12, 18),
        ("evening (18-24)", 18, 24),
        ("night (00-06)", 0, 6),
    ];

    let mut result = Vec::new();
    for (label, from, to) in PERIODS {
        let mut per_tag: BTreeMap<String, f64> = BTreeMap::new();
        for row in rows {
            if is_sentinel(row) || row.tag_name.as_deref() == Some(TAG_AWAY) {
                continue;
            }
            let hour = row.start_time.time().hour();
            if hour < from || hour >= to {
                continue;
            }
            let tag = row
                .tag_name
                .clone()
                .unwrap_or_else(|| TAG_UNCLASSIFIED.into());
            *per_tag.entry(tag).or_default() += row_seconds(row, now);
        }
        if !per_tag.is_empty() {
            result.push((label, per_tag.into_iter().collect()));
        }
    }
    result
}

/// Away intervals of at least five minutes, as (from, to, seconds).
fn away_records(rows: &[TimelineRow], now: NaiveDateTime) -> Vec<(String, String, f64)> {
    let mut records = Vec::new();
    for row in rows {
        if !is_sentinel(row) {
            continue;
        }
        let secs = row_seconds(row, now);
        if secs < MIN_AWAY_SECONDS {
            continue;
        }
        let end = row.end_time.unwrap_or(now);
        records.push((
            row.start_time.format("%H:%M").to_string(),
            end.format("%H:%M").to_string(),
            secs,
        ));
    }
    records.sort_by(|a, b| a.0.cmp(&b.0));
    records
}
