//! Per-connection lifecycle: register, pump frames, deregister.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::dispatch::handle_frame;
use crate::state::{ConnectionState, ServerState};

/// Drive one client connection until the peer disconnects or the server
/// stops.
///
/// Outbound traffic (responses and broadcasts alike) goes through an
/// unbounded channel drained by a dedicated writer task, so neither the
/// dispatcher nor a broadcast ever blocks on a slow peer.
pub async fn handle_socket(
    state: Arc<ServerState>,
    socket: WebSocket,
    shutdown: CancellationToken,
) {
    let conn_id = Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "Client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<String>();

    {
        let mut connections = state.connections.write().await;
        connections.insert(
            conn_id.clone(),
            ConnectionState {
                conn_id: conn_id.clone(),
                event_tx: event_tx.clone(),
            },
        );
    }

    let send_task = tokio::spawn(async move {
        while let Some(frame) = event_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!(conn_id = %conn_id, "Server stopping, closing connection");
                break;
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_frame(&state, text.as_str()).await;
                        match serde_json::to_string(&response) {
                            // A dead writer means the peer is gone; the
                            // disconnect path below reaps the registration.
                            Ok(frame) => {
                                let _ = event_tx.send(frame);
                            }
                            Err(e) => error!(conn_id = %conn_id, %e, "Failed to serialize response"),
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(conn_id = %conn_id, "Client requested close");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong handled by axum; binary frames ignored.
                    }
                    Some(Err(e)) => {
                        debug!(conn_id = %conn_id, %e, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    send_task.abort();
    state.connections.write().await.remove(&conn_id);
    info!(conn_id = %conn_id, "Client disconnected");
}
