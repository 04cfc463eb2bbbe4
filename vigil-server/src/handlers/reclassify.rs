//! Re-run the rule engine over historical activities.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use vigil_model::TAG_UNCLASSIFIED;

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

/// Reclassify activities currently tagged *Unclassified* (or nothing).
pub async fn untagged(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let unclassified = state.db.tag_by_name(TAG_UNCLASSIFIED).await?.map(|t| t.id);
    run(&state, unclassified).await
}

/// Reclassify everything.
pub async fn all(State(state): State<AppState>) -> AppResult<Json<Value>> {
    run(&state, None).await
}

async fn run(
    state: &AppState,
    unclassified_tag: Option<vigil_model::TagId>,
) -> AppResult<Json<Value>> {
    let targets = state.db.activities_for_reclassify(unclassified_tag).await?;
    let mut changed = 0usize;

    for (activity_id, observation) in &targets {
        let (tag_id, rule_id) = state.engine.classify(observation).await?;
        state
            .db
            .update_activity_classification(*activity_id, tag_id, rule_id)
            .await?;
        changed += 1;
    }

    Ok(Json(json!({
        "examined": targets.len(),
        "reclassified": changed,
    })))
}
