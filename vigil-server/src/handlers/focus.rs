//! Per-tag block configuration and the emergency reset.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use vigil_core::focus::block_update_forbidden;
use vigil_model::{Tag, TagDraft, TagId};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

const MIN_REASON_LENGTH: usize = 10;

#[derive(Debug, Serialize)]
pub struct FocusEntry {
    pub tag_id: TagId,
    pub tag_name: String,
    pub block_enabled: bool,
    pub block_start_time: Option<String>,
    pub block_end_time: Option<String>,
    pub currently_active: bool,
}

impl FocusEntry {
    fn from_tag(tag: &Tag) -> Self {
        let now = Local::now().time();
        Self {
            tag_id: tag.id,
            tag_name: tag.name.clone(),
            block_enabled: tag.block_enabled,
            block_start_time: tag.block_start_time.clone(),
            block_end_time: tag.block_end_time.clone(),
            currently_active: tag.block_enabled
                && tag.block_window().map(|w| w.contains(now)).unwrap_or(false),
        }
    }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<FocusEntry>>> {
    let tags = state.db.list_tags().await?;
    Ok(Json(
        tags.iter()
            .filter(|t| !t.is_reserved())
            .map(FocusEntry::from_tag)
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct FocusUpdate {
    pub block_enabled: Option<bool>,
    pub block_start_time: Option<String>,
    pub block_end_time: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<FocusUpdate>,
) -> AppResult<Json<FocusEntry>> {
    let id = TagId(id);
    let tag = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("tag {id}")))?;
    if tag.is_reserved() {
        return Err(AppError::bad_request(
            "reserved tags cannot carry a block configuration",
        ));
    }
    if block_update_forbidden(&tag, Local::now().time()) {
        return Err(AppError::forbidden(format!(
            "tag `{}` is inside its active block window",
            tag.name
        )));
    }

    let draft = TagDraft {
        block_enabled: body.block_enabled,
        block_start_time: body.block_start_time,
        block_end_time: body.block_end_time,
        ..Default::default()
    };
    state.db.update_tag(id, &draft).await?;
    state.enforcer.reload().await?;

    let updated = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::internal("tag vanished after update"))?;
    Ok(Json(FocusEntry::from_tag(&updated)))
}

#[derive(Debug, Deserialize)]
pub struct EmergencyReset {
    pub reason: String,
}

/// Clear every block flag. The reason is mandatory, non-trivial, and
/// recorded in the activity log.
pub async fn emergency_reset(
    State(state): State<AppState>,
    Json(body): Json<EmergencyReset>,
) -> AppResult<Json<Value>> {
    let reason = body.reason.trim();
    if reason.chars().count() < MIN_REASON_LENGTH {
        return Err(AppError::bad_request(format!(
            "reason must be at least {MIN_REASON_LENGTH} characters"
        )));
    }

    let cleared = state.db.clear_all_block_flags().await?;
    state.enforcer.reload().await?;
    if let Err(err) = state.loggen.log_emergency_reset(&cleared, reason).await {
        tracing::warn!(%err, "failed to record emergency reset");
    }
    tracing::info!(?cleared, %reason, "emergency reset performed");

    Ok(Json(json!({ "cleared": cleared })))
}
