//! Activity repository and aggregate statistics.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use vigil_model::{
    Activity, ActivityId, Observation, RuleId, TagId, TimelineRow, PROCESS_IDLE, PROCESS_LOCKED,
};

use crate::error::Result;

use super::{is_busy, warn_busy_retry, Database, BUSY_RETRIES};

/// Aggregated seconds per tag over a window.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TagStat {
    pub tag_id: TagId,
    pub tag_name: String,
    pub tag_color: String,
    pub total_seconds: f64,
}

/// Aggregated seconds per process over a window.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProcessStat {
    pub process_name: String,
    pub total_seconds: f64,
    pub activity_count: i64,
}

/// Aggregated seconds for one tag within one local hour of day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HourlyStat {
    pub hour: i64,
    pub tag_id: TagId,
    pub tag_name: String,
    pub tag_color: String,
    pub total_seconds: f64,
}

/// Raw per-activity URL usage, aggregated into domains by the caller.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UrlUsage {
    pub browser_url: String,
    pub total_seconds: f64,
}

/// Window processes that never describe real usage: the away sentinels and
/// the Windows lock screen host.
const EXCLUDED_PROCESSES: (&str, &str, &str) = (PROCESS_LOCKED, PROCESS_IDLE, "LockApp.exe");

impl Database {
    /// Insert a new open interval (`end_time` NULL) starting now.
    pub async fn create_activity(
        &self,
        observation: &Observation,
        tag_id: Option<TagId>,
        rule_id: Option<RuleId>,
    ) -> Result<ActivityId> {
        let started = Local::now().naive_local();
        let mut attempt = 0;
        loop {
            let result = sqlx::query(
                "INSERT INTO activities \
                 (start_time, process_name, window_title, browser_url, browser_profile, tag_id, rule_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(started)
            .bind(&observation.process_name)
            .bind(&observation.window_title)
            .bind(&observation.browser_url)
            .bind(&observation.browser_profile)
            .bind(tag_id)
            .bind(rule_id)
            .execute(self.pool())
            .await;

            match result {
                Ok(done) => return Ok(ActivityId(done.last_insert_rowid())),
                Err(err) if is_busy(&err) && attempt < BUSY_RETRIES => {
                    attempt += 1;
                    warn_busy_retry(attempt, "create_activity");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Close an open interval. Idempotent: a second call leaves the first
    /// end timestamp in place.
    pub async fn end_activity(&self, id: ActivityId) -> Result<()> {
        let ended = Local::now().naive_local();
        let mut attempt = 0;
        loop {
            let result =
                sqlx::query("UPDATE activities SET end_time = ? WHERE id = ? AND end_time IS NULL")
                    .bind(ended)
                    .bind(id)
                    .execute(self.pool())
                    .await;

            match result {
                Ok(_) => return Ok(()),
                Err(err) if is_busy(&err) && attempt < BUSY_RETRIES => {
                    attempt += 1;
                    warn_busy_retry(attempt, "end_activity");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Crash repair: every interval left open gets `end = start + 60s`.
    /// Returns the number of rows repaired.
    pub async fn repair_open_activities(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE activities SET end_time = datetime(start_time, '+1 minute') \
             WHERE end_time IS NULL",
        )
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_activities(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        tag_id: Option<TagId>,
        limit: Option<i64>,
    ) -> Result<Vec<TimelineRow>> {
        let mut query = String::from(
            "SELECT a.id, a.start_time, a.end_time, a.process_name, a.window_title, \
             a.browser_url, a.browser_profile, a.tag_id, a.rule_id, \
             t.name AS tag_name, t.color AS tag_color \
             FROM activities a LEFT JOIN tags t ON a.tag_id = t.id \
             WHERE a.start_time >= ? AND a.start_time < ?",
        );
        if tag_id.is_some() {
            query.push_str(" AND a.tag_id = ?");
        }
        query.push_str(" ORDER BY a.start_time DESC");
        if limit.is_some() {
            query.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, TimelineRow>(&query).bind(start).bind(end);
        if let Some(tag_id) = tag_id {
            q = q.bind(tag_id);
        }
        if let Some(limit) = limit {
            q = q.bind(limit);
        }
        Ok(q.fetch_all(self.pool()).await?)
    }

    pub async fn latest_activity(&self) -> Result<Option<Activity>> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT id, start_time, end_time, process_name, window_title, browser_url, \
             browser_profile, tag_id, rule_id \
             FROM activities ORDER BY start_time DESC LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(activity)
    }

    pub async fn count_open_activities(&self) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE end_time IS NULL")
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    /// Seconds per tag for activities overlapping `[start, end)`. Open
    /// activities count up to now.
    pub async fn stats_by_tag(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TagStat>> {
        let now = Local::now().naive_local();
        let stats = sqlx::query_as::<_, TagStat>(
            "SELECT t.id AS tag_id, t.name AS tag_name, t.color AS tag_color, \
             SUM((julianday(MIN(COALESCE(a.end_time, ?1), ?1)) - julianday(a.start_time)) * 86400.0) \
               AS total_seconds \
             FROM activities a JOIN tags t ON a.tag_id = t.id \
             WHERE a.start_time < ?3 AND COALESCE(a.end_time, ?1) >= ?2 \
             GROUP BY t.id \
             ORDER BY total_seconds DESC",
        )
        .bind(now)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(stats)
    }

    /// Seconds and interval count per process, sentinels excluded.
    pub async fn stats_by_process(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<ProcessStat>> {
        let now = Local::now().naive_local();
        let stats = sqlx::query_as::<_, ProcessStat>(
            "SELECT process_name, \
             SUM((julianday(COALESCE(end_time, ?1)) - julianday(start_time)) * 86400.0) \
               AS total_seconds, \
             COUNT(*) AS activity_count \
             FROM activities \
             WHERE start_time >= ?2 AND start_time < ?3 \
               AND process_name IS NOT NULL \
               AND process_name NOT IN (?4, ?5, ?6) \
             GROUP BY process_name \
             ORDER BY total_seconds DESC \
             LIMIT ?7",
        )
        .bind(now)
        .bind(start)
        .bind(end)
        .bind(EXCLUDED_PROCESSES.0)
        .bind(EXCLUDED_PROCESSES.1)
        .bind(EXCLUDED_PROCESSES.2)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(stats)
    }

    /// Seconds per tag bucketed by the local hour the activity started in.
    pub async fn hourly_stats(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<HourlyStat>> {
        let now = Local::now().naive_local();
        let stats = sqlx::query_as::<_, HourlyStat>(
            "SELECT CAST(strftime('%H', a.start_time) AS INTEGER) AS hour, \
             t.id AS tag_id, t.name AS tag_name, t.color AS tag_color, \
             SUM((julianday(COALESCE(a.end_time, ?1)) - julianday(a.start_time)) * 86400.0) \
               AS total_seconds \
             FROM activities a JOIN tags t ON a.tag_id = t.id \
             WHERE a.start_time >= ?2 AND a.start_time < ?3 \
             GROUP BY hour, t.id \
             ORDER BY hour ASC, total_seconds DESC",
        )
        .bind(now)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(stats)
    }

    /// Per-activity URL seconds, for domain aggregation.
    pub async fn url_usage(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<UrlUsage>> {
        let now = Local::now().naive_local();
        let usage = sqlx::query_as::<_, UrlUsage>(
            "SELECT browser_url, \
             SUM((julianday(COALESCE(end_time, ?1)) - julianday(start_time)) * 86400.0) \
               AS total_seconds \
             FROM activities \
             WHERE start_time >= ?2 AND start_time < ?3 AND browser_url IS NOT NULL \
             GROUP BY browser_url",
        )
        .bind(now)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(usage)
    }

    /// Activities to feed back through the rule engine. `untagged_only`
    /// restricts the pass to rows currently carrying the given tag
    /// (the *Unclassified* reclassification) or no tag at all.
    pub async fn activities_for_reclassify(
        &self,
        unclassified_tag: Option<TagId>,
    ) -> Result<Vec<(ActivityId, Observation)>> {
        let query = match unclassified_tag {
            Some(_) => {
                "SELECT id, process_name, window_title, browser_url, browser_profile \
                 FROM activities WHERE tag_id = ? OR tag_id IS NULL ORDER BY start_time DESC"
            }
            None => {
                "SELECT id, process_name, window_title, browser_url, browser_profile \
                 FROM activities ORDER BY start_time DESC"
            }
        };

        let mut q = sqlx::query_as::<
            _,
            (ActivityId, Option<String>, Option<String>, Option<String>, Option<String>),
        >(query);
        if let Some(tag_id) = unclassified_tag {
            q = q.bind(tag_id);
        }
        let rows = q.fetch_all(self.pool()).await?;

        Ok(rows
            .into_iter()
            .map(|(id, process, title, url, profile)| {
                (
                    id,
                    Observation {
                        process_name: process.unwrap_or_default(),
                        window_title: title.unwrap_or_default(),
                        browser_url: url,
                        browser_profile: profile,
                        process_path: None,
                        hwnd: None,
                    },
                )
            })
            .collect())
    }

    pub async fn update_activity_classification(
        &self,
        id: ActivityId,
        tag_id: TagId,
        rule_id: Option<RuleId>,
    ) -> Result<()> {
        sqlx::query("UPDATE activities SET tag_id = ?, rule_id = ? WHERE id = ?")
            .bind(tag_id)
            .bind(rule_id)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Manual override from the timeline: the rule attribution is cleared
    /// because no rule produced this tag.
    pub async fn update_activity_tag(&self, id: ActivityId, tag_id: TagId) -> Result<()> {
        let result = sqlx::query("UPDATE activities SET tag_id = ?, rule_id = NULL WHERE id = ?")
            .bind(tag_id)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::error::CoreError::NotFound(format!("activity {id}")));
        }
        Ok(())
    }

    pub async fn delete_activities(&self, ids: &[ActivityId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let query = format!("DELETE FROM activities WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(id);
        }
        let result = q.execute(self.pool()).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;
    use chrono::Duration;

    fn obs(process: &str, title: &str) -> Observation {
        Observation {
            process_name: process.into(),
            window_title: title.into(),
            browser_url: None,
            browser_profile: None,
            process_path: None,
            hwnd: None,
        }
    }

    #[tokio::test]
    async fn at_most_one_open_after_close_open_sequence() {
        let (db, _dir) = open_temp().await;

        let first = db.create_activity(&obs("code.exe", "main.rs"), None, None).await.unwrap();
        db.end_activity(first).await.unwrap();
        let _second = db.create_activity(&obs("chrome.exe", "Docs"), None, None).await.unwrap();

        assert_eq!(db.count_open_activities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn end_activity_is_idempotent() {
        let (db, _dir) = open_temp().await;
        let id = db.create_activity(&obs("code.exe", "main.rs"), None, None).await.unwrap();

        db.end_activity(id).await.unwrap();
        let first_end = db.latest_activity().await.unwrap().unwrap().end_time.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        db.end_activity(id).await.unwrap();
        let second_end = db.latest_activity().await.unwrap().unwrap().end_time.unwrap();

        assert_eq!(first_end, second_end);
    }

    #[tokio::test]
    async fn repair_sets_end_to_start_plus_one_minute() {
        use chrono::Timelike;
        let (db, _dir) = open_temp().await;

        // Whole seconds: sqlite's datetime() arithmetic drops fractions.
        let base = (Local::now().naive_local() - Duration::hours(1))
            .with_nanosecond(0)
            .unwrap();
        for offset in [0, 30] {
            sqlx::query(
                "INSERT INTO activities (start_time, process_name, window_title) VALUES (?, 'x', 'y')",
            )
            .bind(base + Duration::seconds(offset))
            .execute(db.pool())
            .await
            .unwrap();
        }

        let repaired = db.repair_open_activities().await.unwrap();
        assert_eq!(repaired, 2);
        assert_eq!(db.count_open_activities().await.unwrap(), 0);

        let rows = db
            .list_activities(
                base - Duration::minutes(1),
                base + Duration::minutes(5),
                None,
                None,
            )
            .await
            .unwrap();
        for row in rows {
            let end = row.end_time.unwrap();
            assert_eq!(end - row.start_time, Duration::seconds(60));
        }

        // Repair on a clean store is a no-op.
        assert_eq!(db.repair_open_activities().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn manual_tag_override_clears_the_rule_attribution() {
        let (db, _dir) = open_temp().await;
        let work = db.tag_by_name("Work").await.unwrap().unwrap().id;
        let rules = db.list_rules(true).await.unwrap();

        let id = db
            .create_activity(&obs("code.exe", "main.rs"), None, Some(rules[0].id))
            .await
            .unwrap();
        db.update_activity_tag(id, work).await.unwrap();

        let row = db.latest_activity().await.unwrap().unwrap();
        assert_eq!(row.tag_id, Some(work));
        assert_eq!(row.rule_id, None);
    }

    #[tokio::test]
    async fn bulk_delete_removes_exactly_the_given_rows() {
        let (db, _dir) = open_temp().await;
        let mut ids = Vec::new();
        for index in 0..3 {
            let id = db
                .create_activity(&obs("p.exe", &format!("w{index}")), None, None)
                .await
                .unwrap();
            db.end_activity(id).await.unwrap();
            ids.push(id);
        }

        assert_eq!(db.delete_activities(&ids[..2]).await.unwrap(), 2);
        assert_eq!(db.delete_activities(&[]).await.unwrap(), 0);

        let now = Local::now().naive_local();
        let rows = db
            .list_activities(now - Duration::hours(1), now + Duration::hours(1), None, None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ids[2]);
    }

    #[tokio::test]
    async fn stats_by_tag_counts_open_activities_up_to_now() {
        let (db, _dir) = open_temp().await;
        let tag = db
            .create_tag("Focus", "#4CAF50", vigil_model::TagCategory::Work)
            .await
            .unwrap();

        let start = Local::now().naive_local() - Duration::seconds(10);
        sqlx::query(
            "INSERT INTO activities (start_time, process_name, window_title, tag_id) \
             VALUES (?, 'code.exe', 'main.rs', ?)",
        )
        .bind(start)
        .bind(tag)
        .execute(db.pool())
        .await
        .unwrap();

        let window_start = start - Duration::minutes(5);
        let window_end = start + Duration::minutes(5);
        let stats = db.stats_by_tag(window_start, window_end).await.unwrap();
        let row = stats.iter().find(|s| s.tag_id == tag).unwrap();
        assert!(row.total_seconds >= 9.0, "open row counted {}", row.total_seconds);
        assert!(row.total_seconds < 60.0);
    }

    #[tokio::test]
    async fn process_stats_exclude_sentinels() {
        let (db, _dir) = open_temp().await;
        let start = Local::now().naive_local();

        for process in ["code.exe", PROCESS_IDLE, PROCESS_LOCKED, "LockApp.exe"] {
            let id = db.create_activity(&obs(process, "t"), None, None).await.unwrap();
            db.end_activity(id).await.unwrap();
        }

        let stats = db
            .stats_by_process(start - Duration::minutes(1), start + Duration::minutes(1), 10)
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].process_name, "code.exe");
    }

    #[tokio::test]
    async fn hourly_stats_bucket_by_start_hour() {
        let (db, _dir) = open_temp().await;
        let tag = db
            .create_tag("Night", "#333333", vigil_model::TagCategory::Other)
            .await
            .unwrap();

        let day = Local::now().date_naive();
        let at = |h: u32| day.and_hms_opt(h, 15, 0).unwrap();
        for hour in [9u32, 9, 14] {
            sqlx::query(
                "INSERT INTO activities (start_time, end_time, process_name, window_title, tag_id) \
                 VALUES (?, ?, 'p', 't', ?)",
            )
            .bind(at(hour))
            .bind(at(hour) + Duration::minutes(10))
            .bind(tag)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let stats = db
            .hourly_stats(day.and_hms_opt(0, 0, 0).unwrap(), at(23))
            .await
            .unwrap();
        let nine: Vec<_> = stats.iter().filter(|s| s.hour == 9).collect();
        assert_eq!(nine.len(), 1);
        assert!((nine[0].total_seconds - 1200.0).abs() < 1.0);
        assert!(stats.iter().any(|s| s.hour == 14));
    }
}
