//! Settings map and the autostart toggle.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use vigil_model::SettingKey;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

pub async fn get(State(state): State<AppState>) -> AppResult<Json<HashMap<String, String>>> {
    Ok(Json(state.db.all_settings().await?))
}

/// PUT accepts a partial map; unrecognised keys are rejected wholesale so
/// a typo cannot silently create dead configuration.
pub async fn put(
    State(state): State<AppState>,
    Json(body): Json<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    for key in body.keys() {
        if SettingKey::from_str(key).is_none() {
            return Err(AppError::bad_request(format!("unrecognised setting `{key}`")));
        }
    }
    for (key, value) in &body {
        validate(key, value)?;
    }
    for (key, value) in &body {
        state.db.set_setting(key, value).await?;
    }
    Ok(Json(json!({ "updated": body.len() })))
}

fn validate(key: &str, value: &str) -> AppResult<()> {
    let numeric = [
        "polling_interval",
        "idle_threshold",
        "log_retention_days",
        "target_daily_hours",
        "target_distraction_ratio",
    ];
    if numeric.contains(&key) && value.parse::<u64>().map(|v| v == 0).unwrap_or(true) {
        return Err(AppError::bad_request(format!(
            "`{key}` must be a positive integer, got `{value}`"
        )));
    }
    let flags = [
        "alert_toast_enabled",
        "alert_sound_enabled",
        "alert_image_enabled",
    ];
    if flags.contains(&key) && !matches!(value, "0" | "1") {
        return Err(AppError::bad_request(format!("`{key}` must be 0 or 1")));
    }
    let modes = ["alert_sound_mode", "alert_image_mode"];
    if modes.contains(&key) && !matches!(value, "single" | "random") {
        return Err(AppError::bad_request(format!(
            "`{key}` must be `single` or `random`"
        )));
    }
    Ok(())
}

const AUTOSTART_KEY: &str = "autostart_enabled";

#[derive(Debug, Serialize, Deserialize)]
pub struct Autostart {
    pub enabled: bool,
}

/// The per-user autostart entry is managed by an external helper; the
/// daemon only records the desired state.
pub async fn get_autostart(State(state): State<AppState>) -> AppResult<Json<Autostart>> {
    let enabled = state.db.setting(AUTOSTART_KEY).await?.as_deref() == Some("1");
    Ok(Json(Autostart { enabled }))
}

pub async fn put_autostart(
    State(state): State<AppState>,
    Json(body): Json<Autostart>,
) -> AppResult<Json<Autostart>> {
    state
        .db
        .set_setting(AUTOSTART_KEY, if body.enabled { "1" } else { "0" })
        .await?;
    Ok(Json(body))
}
