//! WebSocket bridge between door clients and the tournament bus.
//!
//! Every connection subscribes to the bus and receives every frame
//! published on it. Frames a connection sends are checked and republished:
//! only requests (`tournament-create`, `tournament-join` without a seat,
//! `tournament-score`, ...) pass. State-change messages are the authority's
//! alone, so a client sending one is dropped rather than forwarded.
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws');
//! ws.send(JSON.stringify({ type: "tournament-create", host: "ann", userId: 1 }));
//! ```

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bbs_tourney::{
    Bus,
    net::{
        errors::{BusError, ProtocolError},
        utils,
    },
};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tracing::{error, info};

use super::AppState;
use crate::{logging, metrics};

/// Why an inbound frame was not republished.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0} may only come from the tournament authority")]
    Authoritative(&'static str),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl RelayError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Protocol(ProtocolError::FrameTooLarge { .. }) => "too_large",
            Self::Protocol(_) => "malformed",
            Self::Authoritative(_) => "authoritative",
            Self::Bus(_) => "bus",
        }
    }
}

/// Check one client frame and publish it. Returns the message kind.
pub fn relay_frame<B: Bus + ?Sized>(bus: &B, frame: &str) -> Result<&'static str, RelayError> {
    let message = utils::decode(frame)?;
    if message.is_authoritative() {
        return Err(RelayError::Authoritative(message.kind()));
    }
    bus.publish(&message)?;
    Ok(message.kind())
}

/// Upgrade to a WebSocket bridged onto the bus.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection, active) = state.connections.open();
    metrics::websocket_connections_total();
    metrics::websocket_connections_active(active);
    info!("WebSocket connected: connection={}", connection);

    // Subscribe before reading anything so replies to this connection's
    // first request are never missed.
    let mut subscription = state.bus.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            match subscription.recv_frame().await {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                    metrics::frames_sent();
                }
                Err(BusError::Lagged(skipped)) => {
                    logging::log_frames_dropped(connection, skipped);
                    metrics::frames_dropped(skipped);
                }
                Err(e) => {
                    info!("Bus closed for connection {}: {}", connection, e);
                    break;
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match relay_frame(state.bus.as_ref(), text.as_str()) {
                Ok(kind) => metrics::frames_received(kind),
                Err(e) => {
                    logging::log_frame_rejected(connection, &e.to_string());
                    metrics::frames_rejected(e.reason());
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                error!("WebSocket error on connection {}: {}", connection, e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    let active = state.connections.close();
    metrics::websocket_connections_active(active);
    info!("WebSocket disconnected: connection={}", connection);
}
