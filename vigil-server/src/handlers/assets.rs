//! Alert sound/image asset metadata CRUD. The store manages pointers;
//! the files themselves live under the sounds/ and images/ directories.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use vigil_core::store::AssetKind;
use vigil_model::{AssetId, MediaAsset};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewAsset {
    pub name: String,
    pub file_path: String,
}

async fn list(state: &AppState, kind: AssetKind) -> AppResult<Json<Vec<MediaAsset>>> {
    Ok(Json(state.db.list_assets(kind).await?))
}

async fn create(state: &AppState, kind: AssetKind, body: NewAsset) -> AppResult<Json<MediaAsset>> {
    if body.name.trim().is_empty() || body.file_path.trim().is_empty() {
        return Err(AppError::bad_request("asset name and file_path are required"));
    }
    let id = state
        .db
        .add_asset(kind, body.name.trim(), body.file_path.trim())
        .await?;
    state
        .db
        .asset_by_id(kind, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::internal("asset vanished after insert"))
}

async fn delete(state: &AppState, kind: AssetKind, id: i64) -> AppResult<Json<Value>> {
    state.db.delete_asset(kind, AssetId(id)).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn list_sounds(State(state): State<AppState>) -> AppResult<Json<Vec<MediaAsset>>> {
    list(&state, AssetKind::Sound).await
}

pub async fn create_sound(
    State(state): State<AppState>,
    Json(body): Json<NewAsset>,
) -> AppResult<Json<MediaAsset>> {
    create(&state, AssetKind::Sound, body).await
}

pub async fn delete_sound(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    delete(&state, AssetKind::Sound, id).await
}

pub async fn list_images(State(state): State<AppState>) -> AppResult<Json<Vec<MediaAsset>>> {
    list(&state, AssetKind::Image).await
}

pub async fn create_image(
    State(state): State<AppState>,
    Json(body): Json<NewAsset>,
) -> AppResult<Json<MediaAsset>> {
    create(&state, AssetKind::Image, body).await
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    delete(&state, AssetKind::Image, id).await
}
