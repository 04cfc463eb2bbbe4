use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

use vigil_config::{Config, Paths};
use vigil_core::engine::RuleEngine;
use vigil_core::focus::FocusEnforcer;
use vigil_core::ingest::LatestFrame;
use vigil_core::loggen::LogGenerator;
use vigil_core::monitor::MonitorEngine;
use vigil_core::notify::Notifier;
use vigil_core::probe::{system_probe, NullProbe};
use vigil_core::transfer::TransferManager;
use vigil_core::Database;
use vigil_server::{infra::app_state::AppState, routes::create_router};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _tempdir: TempDir,
}

/// A fully wired app over a temp store. The monitor loop task is built
/// but not spawned: handlers only touch its control handle.
pub async fn build_test_app() -> TestApp {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let paths = Paths::from_root(tempdir.path().join("state"));
    paths.ensure_dirs().expect("data dirs");

    let db = Database::open(&paths.database()).await.expect("open store");
    let probe = Arc::new(NullProbe);
    let engine = Arc::new(RuleEngine::new(db.clone()).await.expect("engine"));
    let enforcer = Arc::new(
        FocusEnforcer::new(db.clone(), probe)
            .await
            .expect("enforcer"),
    );
    let notifier = Arc::new(Notifier::new(db.clone()));
    let loggen = Arc::new(LogGenerator::new(db.clone(), paths.clone()));
    let transfer = Arc::new(TransferManager::new(db.clone(), paths.clone()));

    let (_monitor, handle) = MonitorEngine::new(
        db.clone(),
        engine.clone(),
        enforcer.clone(),
        notifier,
        system_probe(),
        LatestFrame::default(),
        None,
    );

    let (exit_tx, _exit_rx) = watch::channel(false);
    let state = AppState {
        db,
        engine,
        enforcer,
        monitor: handle,
        transfer,
        loggen,
        paths,
        config: Arc::new(Config::default()),
        exit: exit_tx,
    };

    TestApp {
        router: create_router(state.clone()),
        state,
        _tempdir: tempdir,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
