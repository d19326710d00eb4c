//! Realtime channel: one WebSocket per client connection.
//!
//! Client frames are JSON `{ "event": name, "data": payload }` objects
//! decoded into [`ClientEvent`]s; everything the engine queues for the
//! connection is written back in the same shape.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use sketchroom_core::{ClientEvent, ServerEvent};

use crate::state::AppState;

/// Error code for frames that are not a known client event.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let router = state.router.clone();
    let (connection_id, mut outbound) = router.connect();
    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // Drain the connection's queue onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(event = event.name(), error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => router.handle(&connection_id, event).await,
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Invalid client frame");
                    router.send(
                        &connection_id,
                        ServerEvent::error(INVALID_MESSAGE, format!("Invalid message: {}", e)),
                    );
                }
            },
            Ok(Message::Binary(_)) => {
                router.send(
                    &connection_id,
                    ServerEvent::error(INVALID_MESSAGE, "Binary frames are not supported"),
                );
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong are answered by axum
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    router.disconnect(&connection_id).await;
    send_task.abort();
    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}
