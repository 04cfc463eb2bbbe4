//! Browser-extension frame ingestion.
//!
//! A loopback WebSocket listener accepts `url_change` frames from the
//! companion extension and keeps only the most recent accepted frame in a
//! mutex-guarded cell. The monitor loop reads the cell when the foreground
//! process is a browser; correlation against the active window title
//! happens there, not here.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::any,
    Router,
};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// The latest accepted extension frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFrame {
    pub url: String,
    pub profile: Option<String>,
    pub title: String,
    pub tab_id: Option<i64>,
    pub timestamp: Option<i64>,
}

/// Shared cell between the ingester task and the monitor loop. Readers
/// hold the lock only for the duration of a clone.
#[derive(Debug, Clone, Default)]
pub struct LatestFrame(Arc<Mutex<Option<UrlFrame>>>);

impl LatestFrame {
    pub fn set(&self, frame: UrlFrame) {
        if let Ok(mut cell) = self.0.lock() {
            *cell = Some(frame);
        }
    }

    pub fn get(&self) -> Option<UrlFrame> {
        self.0.lock().ok().and_then(|cell| cell.clone())
    }
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    #[serde(rename = "profileName")]
    profile_name: Option<String>,
    title: Option<String>,
    #[serde(rename = "tabId")]
    tab_id: Option<i64>,
    timestamp: Option<i64>,
}

/// Parse one wire message; anything unrecognised or malformed is `None`.
fn parse_frame(raw: &str) -> Option<UrlFrame> {
    let wire: WireFrame = serde_json::from_str(raw).ok()?;
    if wire.kind != "url_change" {
        return None;
    }
    Some(UrlFrame {
        url: wire.url?,
        profile: wire.profile_name,
        title: wire.title.unwrap_or_default(),
        tab_id: wire.tab_id,
        timestamp: wire.timestamp,
    })
}

/// The extension-facing WebSocket server.
#[derive(Debug)]
pub struct UrlIngester {
    port: u16,
    latest: LatestFrame,
}

impl UrlIngester {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            latest: LatestFrame::default(),
        }
    }

    /// Handle the monitor loop reads from.
    pub fn latest(&self) -> LatestFrame {
        self.latest.clone()
    }

    /// Serve until `shutdown` flips. A bind failure is fatal for the
    /// ingester but not for the daemon: the loop simply never sees URLs.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port);
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%addr, %err, "failed to bind extension listener; URL ingestion disabled");
                return;
            }
        };
        info!(%addr, "extension listener started");

        let app = Router::new()
            .route("/", any(upgrade_handler))
            .with_state(self.latest.clone());

        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Err(err) = serve.await {
            error!(%err, "extension listener terminated");
        }
    }
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(latest): State<LatestFrame>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, latest))
}

async fn handle_socket(mut socket: WebSocket, latest: LatestFrame) {
    info!("browser extension connected");

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(frame) = parse_frame(text.as_str()) {
                    debug!(url = %frame.url, profile = ?frame.profile, "url frame received");
                    latest.set(frame);
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    info!("browser extension disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_change_frames_are_accepted() {
        let frame = parse_frame(
            r#"{"type":"url_change","url":"https://youtube.com","profileName":"Default",
               "title":"YouTube","tabId":7,"timestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(frame.url, "https://youtube.com");
        assert_eq!(frame.profile.as_deref(), Some("Default"));
        assert_eq!(frame.title, "YouTube");
        assert_eq!(frame.tab_id, Some(7));
    }

    #[test]
    fn other_message_types_are_dropped() {
        assert!(parse_frame(r#"{"type":"heartbeat"}"#).is_none());
        assert!(parse_frame(r#"{"type":"url_change"}"#).is_none());
        assert!(parse_frame("not json at all").is_none());
    }

    #[test]
    fn cell_keeps_only_the_most_recent_frame() {
        let cell = LatestFrame::default();
        assert!(cell.get().is_none());

        for url in ["https://a.example", "https://b.example"] {
            cell.set(UrlFrame {
                url: url.into(),
                profile: None,
                title: String::new(),
                tab_id: None,
                timestamp: None,
            });
        }
        assert_eq!(cell.get().unwrap().url, "https://b.example");
    }
}
