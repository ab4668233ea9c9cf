//! WebSocket stream of session events

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::orchestrator::Orchestrator;
use crate::session::SessionState;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Request current session state
    GetState,
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing control message; session events are sent as-is
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established
    Connected { state: SessionState },
    /// Current session state
    State { state: SessionState },
    /// Pong response
    Pong,
    /// Error occurred
    Error { message: String },
}

/// Build session WebSocket router
pub fn routes() -> Router<Arc<ApiState>> {
    Router::new().route("/ws/session", get(ws_upgrade))
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let orchestrator = state.orchestrator.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, orchestrator))
}

/// Forward session events until either side closes
async fn handle_socket(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = orchestrator.events();

    let connected = WsOutgoing::Connected {
        state: orchestrator.state(),
    };
    if send_json(&mut sender, &connected).await.is_err() {
        return;
    }
    tracing::info!("session WebSocket connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session WebSocket lagged, resending state");
                    let state = WsOutgoing::State { state: orchestrator.state() };
                    if send_json(&mut sender, &state).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_message(&text, &orchestrator);
                    if send_json(&mut sender, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("session WebSocket disconnected");
}

/// Answer a single incoming message
fn handle_message(text: &str, orchestrator: &Orchestrator) -> WsOutgoing {
    match serde_json::from_str::<WsIncoming>(text) {
        Ok(WsIncoming::Ping) => WsOutgoing::Pong,
        Ok(WsIncoming::GetState) => WsOutgoing::State {
            state: orchestrator.state(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "invalid session websocket message");
            WsOutgoing::Error {
                message: format!("invalid message: {e}"),
            }
        }
    }
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    match serde_json::to_string(value) {
        Ok(text) => sender.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize websocket message");
            Ok(())
        }
    }
}
