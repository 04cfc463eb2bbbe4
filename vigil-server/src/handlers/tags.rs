//! Tag CRUD. Every mutation reloads the rule engine and the focus
//! enforcer so the monitor loop sees the change on its next tick.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};

use vigil_core::focus::block_update_forbidden;
use vigil_model::{Tag, TagCategory, TagDraft, TagId};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.db.list_tags().await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Tag>> {
    state
        .db
        .tag_by_id(TagId(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("tag {id}")))
}

#[derive(Debug, Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub category: Option<TagCategory>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateTag>,
) -> AppResult<Json<Tag>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("tag name must not be empty"));
    }
    if state.db.tag_by_name(name).await?.is_some() {
        return Err(AppError::bad_request(format!("tag `{name}` already exists")));
    }

    let id = state
        .db
        .create_tag(name, &body.color, body.category.unwrap_or_default())
        .await?;
    state.reload_classifiers().await?;

    let tag = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::internal("tag vanished after insert"))?;
    Ok(Json(tag))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<TagDraft>,
) -> AppResult<Json<Tag>> {
    let id = TagId(id);
    let tag = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("tag {id}")))?;

    if draft.touches_block_config() {
        if tag.is_reserved() {
            return Err(AppError::bad_request(
                "reserved tags cannot carry a block configuration",
            ));
        }
        // Tampering resistance: no loosening the rules mid-window.
        if block_update_forbidden(&tag, Local::now().time()) {
            return Err(AppError::forbidden(format!(
                "tag `{}` is inside its active block window",
                tag.name
            )));
        }
    }
    if tag.is_reserved() && draft.alert_enabled == Some(true) {
        return Err(AppError::bad_request("reserved tags never alert"));
    }
    if tag.is_reserved() && draft.name.as_deref().is_some_and(|n| n != tag.name) {
        return Err(AppError::bad_request("reserved tags cannot be renamed"));
    }

    state.db.update_tag(id, &draft).await?;
    state.reload_classifiers().await?;

    let updated = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::internal("tag vanished after update"))?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let id = TagId(id);
    let tag = state
        .db
        .tag_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("tag {id}")))?;
    if tag.is_reserved() {
        return Err(AppError::bad_request(format!(
            "the reserved tag `{}` cannot be deleted",
            tag.name
        )));
    }

    state.db.delete_tag(id).await?;
    state.reload_classifiers().await?;
    Ok(Json(json!({ "deleted": id })))
}
