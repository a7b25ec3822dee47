//! Live observer feed.
//!
//! Server-to-observer only: a newly connected observer receives one `init`
//! catch-up frame, then every ledger mutation as it happens. Delivery is
//! best-effort; an observer that lags past the feed capacity skips ahead
//! rather than being replayed to.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::DashboardState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<DashboardState>,
) -> Response {
    debug!("Observer connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: DashboardState) {
    let (mut sender, mut receiver) = socket.split();

    // One-shot catch-up before any live events.
    let snapshot = state.ledger.snapshot();
    let init = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize init snapshot: {}", e);
            return;
        }
    };
    if sender.send(Message::Text(init)).await.is_err() {
        return;
    }

    let mut feed = state.ledger.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(_) => continue,
                    };
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Observer lagged, skipping ahead");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // No observer-to-server messages are defined; drain frames only to
    // notice the peer going away.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("Observer disconnected");
}
