//! Daily / period / hourly dashboard aggregations.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use vigil_core::loggen;
use vigil_core::store::{ProcessStat, TagStat};
use vigil_model::{DomainSlice, TAG_AWAY};

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

const TOP_PROCESSES: i64 = 10;
const TOP_DOMAINS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DailyDashboard {
    pub date: NaiveDate,
    pub tags: Vec<TagStat>,
    pub top_processes: Vec<ProcessStat>,
    pub activity_count: usize,
    pub first_activity: Option<String>,
    pub last_activity: Option<String>,
    pub tag_switches: i64,
}

pub async fn daily(
    State(state): State<AppState>,
    Query(query): Query<DailyQuery>,
) -> AppResult<Json<DailyDashboard>> {
    let start = query.date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1);
    let now = Local::now().naive_local();

    let mut rows = state.db.list_activities(start, end, None, None).await?;
    rows.sort_by_key(|r| (r.start_time, r.id.as_i64()));
    let summary = loggen::summarize(&rows, now);

    let tags = state
        .db
        .stats_by_tag(start, end)
        .await?
        .into_iter()
        .filter(|t| t.tag_name != TAG_AWAY)
        .collect();

    Ok(Json(DailyDashboard {
        date: query.date,
        tags,
        top_processes: state.db.stats_by_process(start, end, TOP_PROCESSES).await?,
        activity_count: rows.len(),
        first_activity: summary.first.map(|t| t.format("%H:%M").to_string()),
        last_activity: summary.last.map(|t| t.format("%H:%M").to_string()),
        tag_switches: summary.tag_switches,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DayStack {
    pub date: NaiveDate,
    pub tags: Vec<TagStat>,
}

#[derive(Debug, Serialize)]
pub struct PeriodDashboard {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub tags: Vec<TagStat>,
    pub days: Vec<DayStack>,
    pub top_processes: Vec<ProcessStat>,
    pub top_domains: Vec<DomainSlice>,
}

pub async fn period(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<PeriodDashboard>> {
    if query.end < query.start {
        return Err(crate::errors::AppError::bad_request(
            "period end precedes start",
        ));
    }

    let window_start = query.start.and_time(NaiveTime::MIN);
    let window_end = query.end.and_time(NaiveTime::MIN) + Duration::days(1);

    let tags: Vec<TagStat> = state
        .db
        .stats_by_tag(window_start, window_end)
        .await?
        .into_iter()
        .filter(|t| t.tag_name != TAG_AWAY)
        .collect();

    let mut days = Vec::new();
    let mut date = query.start;
    while date <= query.end {
        let day_start = date.and_time(NaiveTime::MIN);
        let day_tags = state
            .db
            .stats_by_tag(day_start, day_start + Duration::days(1))
            .await?
            .into_iter()
            .filter(|t| t.tag_name != TAG_AWAY)
            .collect();
        days.push(DayStack { date, tags: day_tags });
        date += Duration::days(1);
    }

    let mut top_domains =
        loggen::aggregate_domains(&state.db.url_usage(window_start, window_end).await?);
    top_domains.truncate(TOP_DOMAINS);

    Ok(Json(PeriodDashboard {
        start: query.start,
        end: query.end,
        tags,
        days,
        top_processes: state
            .db
            .stats_by_process(window_start, window_end, TOP_PROCESSES)
            .await?,
        top_domains,
    }))
}

#[derive(Debug, Serialize)]
pub struct HourlySlice {
    pub tag_id: vigil_model::TagId,
    pub tag_name: String,
    pub tag_color: String,
    pub total_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct HourlyDashboard {
    pub date: NaiveDate,
    /// Index = local hour of day, 0..24.
    pub hours: Vec<Vec<HourlySlice>>,
}

pub async fn hourly(
    State(state): State<AppState>,
    Query(query): Query<DailyQuery>,
) -> AppResult<Json<HourlyDashboard>> {
    let start = query.date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1);

    let mut hours: Vec<Vec<HourlySlice>> = (0..24).map(|_| Vec::new()).collect();
    for stat in state.db.hourly_stats(start, end).await? {
        let hour = stat.hour.clamp(0, 23) as usize;
        hours[hour].push(HourlySlice {
            tag_id: stat.tag_id,
            tag_name: stat.tag_name,
            tag_color: stat.tag_color,
            total_seconds: stat.total_seconds,
        });
    }

    Ok(Json(HourlyDashboard {
        date: query.date,
        hours,
    }))
}
