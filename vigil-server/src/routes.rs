//! Route table for the loopback API.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    assets, dashboard, data, focus, monitor, reclassify, rules, settings, tags, timeline,
};
use crate::infra::app_state::AppState;
use crate::ws;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Dashboards and timeline
        .route("/api/dashboard/daily", get(dashboard::daily))
        .route("/api/dashboard/period", get(dashboard::period))
        .route("/api/dashboard/hourly", get(dashboard::hourly))
        .route("/api/timeline", get(timeline::timeline).delete(timeline::delete))
        .route("/api/timeline/{id}/tag", put(timeline::set_tag))
        // Tags
        .route("/api/tags", get(tags::list).post(tags::create))
        .route(
            "/api/tags/{id}",
            get(tags::get).put(tags::update).delete(tags::delete),
        )
        // Rules
        .route("/api/rules", get(rules::list).post(rules::create))
        .route(
            "/api/rules/{id}",
            get(rules::get).put(rules::update).delete(rules::delete),
        )
        // Reclassification
        .route("/api/reclassify/untagged", post(reclassify::untagged))
        .route("/api/reclassify/all", post(reclassify::all))
        // Settings
        .route("/api/settings", get(settings::get).put(settings::put))
        .route(
            "/api/settings/autostart",
            get(settings::get_autostart).put(settings::put_autostart),
        )
        // Focus enforcement
        .route("/api/focus", get(focus::list))
        .route("/api/focus/{tag_id}", put(focus::update))
        .route("/api/focus/emergency-reset", post(focus::emergency_reset))
        // Data transfer
        .route("/api/data/db/backup", post(data::backup))
        .route("/api/data/db/restore", post(data::restore))
        .route("/api/data/rules/export", get(data::export_rules))
        .route("/api/data/rules/import", post(data::import_rules))
        // Alert media assets
        .route("/api/sounds", get(assets::list_sounds).post(assets::create_sound))
        .route("/api/sounds/{id}", delete(assets::delete_sound))
        .route("/api/images", get(assets::list_images).post(assets::create_image))
        .route("/api/images/{id}", delete(assets::delete_image))
        // Monitor control plane
        .route("/api/monitor/status", get(monitor::status))
        .route("/api/monitor/pause", post(monitor::pause))
        .route("/api/monitor/resume", post(monitor::resume))
        // Activity stream
        .route("/ws/activity", get(ws::activity_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
