//! Monitor loop control plane: pause/resume and status.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

pub async fn status(State(state): State<AppState>) -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "paused": state.monitor.is_paused(),
        "stopped": state.monitor.is_stopped(),
        "open_activities": state.db.count_open_activities().await?,
    })))
}

pub async fn pause(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.monitor.pause();
    Ok(Json(json!({ "paused": true })))
}

pub async fn resume(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.monitor.resume();
    Ok(Json(json!({ "paused": false })))
}
