//! Progress channel over WebSocket.
//!
//! Each connection is one broadcaster listener. The server pushes every
//! progress event as `{"type":"progress","data":{...}}`, sends a Ping frame
//! on an interval to keep intermediaries from idling the connection out,
//! and answers a text `ping` with `{"type":"pong"}`.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use sq_core::events::ServerMessage;
use sq_core::ProgressEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::{Instant, MissedTickBehavior};

use crate::context::AppContext;

/// Interval between server Ping frames.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/ws
pub async fn progress_socket(State(ctx): State<AppContext>, ws: WebSocketUpgrade) -> Response {
    // Subscribe before the upgrade completes so a client that starts a
    // conversion right after the handshake sees all of its events.
    let rx = ctx.progress.subscribe();
    tracing::debug!(listeners = ctx.progress.listener_count(), "Progress listener connected");
    ws.on_upgrade(move |socket| relay(socket, rx, HEARTBEAT_INTERVAL))
}

async fn relay(mut socket: WebSocket, mut rx: Receiver<ProgressEvent>, heartbeat: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => {
                    if send_json(&mut socket, &ServerMessage::from(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress listener lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) if text.as_str().trim().eq_ignore_ascii_case("ping") => {
                    if send_json(&mut socket, &ServerMessage::Pong).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Progress socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = ticker.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Progress listener disconnected");
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}
