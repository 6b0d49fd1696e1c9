//! WebSocket endpoints.
//!
//! `/ws/state` carries the observer protocol: inbound frames are client
//! messages, outbound frames are engine messages. `/ws/redirect-target`
//! accepts exactly one handshake frame and closes; its effect (if the
//! ticket verifies) surfaces as a tab navigation, never as a reply.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use safeguard_sync::{ClientMessage, HandshakeMessage};

use crate::state::AppState;

/// GET /ws/state - Observer connection.
pub async fn state_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_state_socket(socket, state))
}

async fn handle_state_socket(socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let Ok(connection) = state.engine.connect(outbound_tx).await else {
        return;
    };
    debug!(id = connection.id(), "observer connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                // None: the engine dropped our sender (e.g. after `check`).
                let Some(message) = outbound else { break };
                let Ok(text) = serde_json::to_string(&message) else { break };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let message: ClientMessage = match serde_json::from_str(&text) {
                            Ok(message) => message,
                            Err(error) => {
                                debug!(id = connection.id(), %error, "protocol error, closing");
                                break;
                            }
                        };
                        if connection.send(message).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    _ => break,
                }
            }
        }
    }

    debug!(id = connection.id(), "observer disconnected");
}

/// GET /ws/redirect-target - One-shot interstitial handshake.
pub async fn redirect_target_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_redirect_target_socket(socket, state))
}

async fn handle_redirect_target_socket(mut socket: WebSocket, state: AppState) {
    while let Some(Ok(frame)) = socket.recv().await {
        let Message::Text(text) = frame else {
            continue;
        };

        match serde_json::from_str::<HandshakeMessage>(&text) {
            Ok(message) => {
                let _ = state.engine.handshake(message);
            }
            Err(error) => debug!(%error, "malformed handshake"),
        }
        // One frame per connection, valid or not.
        break;
    }
}
