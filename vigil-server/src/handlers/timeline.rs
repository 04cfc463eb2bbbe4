//! Ordered activity rows for one day.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};

use vigil_model::{ActivityId, TagId, TimelineRow};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

const DEFAULT_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub date: NaiveDate,
    pub tag_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> AppResult<Json<Vec<TimelineRow>>> {
    let start = query.date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1);
    let rows = state
        .db
        .list_activities(
            start,
            end,
            query.tag_id.map(TagId),
            Some(query.limit.unwrap_or(DEFAULT_LIMIT)),
        )
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct TagOverride {
    pub tag_id: i64,
}

/// Manually re-tag one activity; the rule attribution is cleared.
pub async fn set_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TagOverride>,
) -> AppResult<Json<Value>> {
    let tag_id = TagId(body.tag_id);
    if state.db.tag_by_id(tag_id).await?.is_none() {
        return Err(AppError::bad_request(format!("tag {tag_id} does not exist")));
    }
    state.db.update_activity_tag(ActivityId(id), tag_id).await?;
    Ok(Json(json!({ "updated": id })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteActivities {
    pub ids: Vec<i64>,
}

pub async fn delete(
    State(state): State<AppState>,
    Json(body): Json<DeleteActivities>,
) -> AppResult<Json<Value>> {
    let ids: Vec<ActivityId> = body.ids.into_iter().map(ActivityId).collect();
    let deleted = state.db.delete_activities(&ids).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
