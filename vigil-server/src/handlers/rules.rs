//! Rule CRUD; mutations reload the engine cache.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use vigil_model::{Rule, RuleDraft, RuleId, TagId};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Rule>>> {
    Ok(Json(state.db.list_rules(false).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Rule>> {
    state
        .db
        .rule_by_id(RuleId(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("rule {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<RuleDraft>,
) -> AppResult<Json<Rule>> {
    let name = draft
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("rule name is required"))?;
    let tag_id = draft
        .tag_id
        .ok_or_else(|| AppError::bad_request("rule target tag is required"))?;
    ensure_tag_exists(&state, tag_id).await?;

    let id = state.db.create_rule(name, tag_id, &draft).await?;
    state.engine.reload().await?;

    let rule = state
        .db
        .rule_by_id(id)
        .await?
        .ok_or_else(|| AppError::internal("rule vanished after insert"))?;
    Ok(Json(rule))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<RuleDraft>,
) -> AppResult<Json<Rule>> {
    let id = RuleId(id);
    if let Some(tag_id) = draft.tag_id {
        ensure_tag_exists(&state, tag_id).await?;
    }

    state.db.update_rule(id, &draft).await?;
    state.engine.reload().await?;

    let rule = state
        .db
        .rule_by_id(id)
        .await?
        .ok_or_else(|| AppError::internal("rule vanished after update"))?;
    Ok(Json(rule))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let id = RuleId(id);
    state.db.delete_rule(id).await?;
    state.engine.reload().await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn ensure_tag_exists(state: &AppState, tag_id: TagId) -> AppResult<()> {
    if state.db.tag_by_id(tag_id).await?.is_none() {
        return Err(AppError::bad_request(format!(
            "target tag {tag_id} does not exist"
        )));
    }
    Ok(())
}
