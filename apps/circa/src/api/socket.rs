//! # Websocket Live Channel
//!
//! `GET /socket/projects/{project_id}` upgrades to a websocket that receives
//! every change event for the project as a JSON text frame. Project `0`
//! subscribes to all projects.
//!
//! Client text frames are read and ignored; they only keep the connection
//! alive.

use super::AppState;
use super::live::LiveRegistry;
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use circa_core::ProjectId;
use std::sync::Arc;

/// Upgrade handler.
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<u64>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ProjectId(project_id), state.live))
}

async fn handle_socket(mut socket: WebSocket, project: ProjectId, live: Arc<LiveRegistry>) {
    let (subscriber, mut events) = live.register(project);
    tracing::info!(project = project.0, subscriber, "Live subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize live event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(json.into())).await {
                    tracing::debug!(subscriber, "Live send failed: {}", e);
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber, "Live receive failed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    live.unregister(project, subscriber);
    tracing::info!(project = project.0, subscriber, "Live subscriber disconnected");
}
