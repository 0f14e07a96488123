//! WebSocket bridge to the stream hub
//!
//! The hub owns subscription state and filtering; this handler only moves
//! frames between the socket and the hub, answers liveness pongs, and
//! services on-demand metrics requests.

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use forecourt_core::models::{EventKind, StreamEvent};
use forecourt_stream::{ControlOutcome, OutboundMessage};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use crate::state::AppState;

/// GET /ws
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber_id, mut outbound) = state.hub.connect();
    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                OutboundMessage::Welcome { subscriber_id } => Message::Text(
                    json!({
                        "type": "connected",
                        "client_id": subscriber_id,
                        "timestamp": Utc::now(),
                    })
                    .to_string()
                    .into(),
                ),
                OutboundMessage::Event(event) => {
                    Message::Text(serde_json::to_string(&event).unwrap_or_default().into())
                }
                OutboundMessage::Ping => Message::Ping(Bytes::new()),
                OutboundMessage::Close { code, reason } => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let ControlOutcome::MetricsRequest(period) =
                    state.hub.handle_control(subscriber_id, text.as_str())
                {
                    match state.metrics.enterprise_metrics(period).await {
                        Ok(metrics) => state.hub.send_to(
                            subscriber_id,
                            &StreamEvent::new(
                                EventKind::MetricsUpdate,
                                None,
                                serde_json::to_value(&metrics).unwrap_or_default(),
                            ),
                        ),
                        Err(err) => {
                            warn!(subscriber = %subscriber_id, error = %err, "metrics request failed")
                        }
                    }
                }
            }
            Message::Pong(_) => state.hub.touch(subscriber_id),
            Message::Close(_) => {
                debug!(subscriber = %subscriber_id, "peer closed connection");
                break;
            }
            _ => {}
        }
    }

    state.hub.disconnect(subscriber_id);
    send_task.abort();
}
