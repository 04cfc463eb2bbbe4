//! Database backup/restore and rules import/export.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};

use vigil_core::transfer::{RulesExport, RulesImport};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct BackupQuery {
    #[serde(default)]
    pub include_media: bool,
}

/// Stream a consistent snapshot of the store, optionally zipped together
/// with the media directories.
pub async fn backup(
    State(state): State<AppState>,
    Query(query): Query<BackupQuery>,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let (staging, filename) = if query.include_media {
        (
            state.paths.root().join(format!("backup-{stamp}.zip")),
            format!("vigil-backup-{stamp}.zip"),
        )
    } else {
        (
            state.paths.root().join(format!("backup-{stamp}.db")),
            format!("vigil-backup-{stamp}.db"),
        )
    };

    let result = if query.include_media {
        state.transfer.backup_with_media(&staging).await
    } else {
        state.transfer.backup_database(&staging).await
    };
    if let Err(err) = result {
        let _ = std::fs::remove_file(&staging);
        return Err(err.into());
    }

    let bytes = std::fs::read(&staging).map_err(|err| AppError::internal(err.to_string()))?;
    let _ = std::fs::remove_file(&staging);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .map_err(|err| AppError::internal(err.to_string()))?,
    );
    Ok((headers, bytes))
}

/// Validate the uploaded database, stage it, and ask the process to exit;
/// the next start-up swaps the staged file in before opening the store.
pub async fn restore(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    if body.is_empty() {
        return Err(AppError::bad_request("empty upload"));
    }

    state.transfer.stage_restore(&body, None).await?;
    state.request_exit();

    Ok(Json(json!({
        "status": "staged",
        "message": "restore staged; the daemon is restarting to apply it",
    })))
}

pub async fn export_rules(State(state): State<AppState>) -> AppResult<Json<RulesExport>> {
    Ok(Json(state.transfer.export_rules().await?))
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    #[serde(default = "default_merge")]
    pub merge_mode: bool,
}

fn default_merge() -> bool {
    true
}

pub async fn import_rules(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(body): Json<RulesImport>,
) -> AppResult<Json<Value>> {
    let stats = state.transfer.import_rules(body, query.merge_mode).await?;
    state.reload_classifiers().await?;
    Ok(Json(json!({ "stats": stats })))
}
