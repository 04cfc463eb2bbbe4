//! The activity-update WebSocket.
//!
//! Every activity transition the monitor loop publishes is forwarded to
//! each connected client as `{type: "activity_update", data: …}`. The
//! server answers a literal `ping` text frame with `pong`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::debug;

use crate::infra::app_state::AppState;

pub async fn activity_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.monitor.subscribe_updates();
    debug!("activity websocket client connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Ok(update) = update else {
                    // Lagged or closed; a UI can refetch the timeline.
                    break;
                };
                let frame = json!({
                    "type": "activity_update",
                    "data": update,
                });
                if sender
                    .send(Message::Text(frame.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        if sender.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!("activity websocket client disconnected");
}
