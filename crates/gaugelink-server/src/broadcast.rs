//! Notification fan-out to all connected clients.

use gaugelink_core::protocol::Notification;
use tracing::debug;

use crate::state::ServerState;

/// Serialize `notification` once and deliver the same frame to every
/// registered connection.
///
/// Sends are non-blocking channel pushes; a failed push (client gone or
/// backed up past channel teardown) is dropped silently and the connection
/// is reaped by its own disconnect path. Holding the registry read lock for
/// the duration makes delivery atomic with respect to new registrations.
pub async fn broadcast_notification(state: &ServerState, notification: &Notification) {
    let frame = match serde_json::to_string(notification) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(%e, "Failed to serialize notification");
            return;
        }
    };

    let connections = state.connections.read().await;
    let mut sent = 0;
    for conn in connections.values() {
        if conn.event_tx.send(frame.clone()).is_ok() {
            sent += 1;
        }
    }
    debug!(sent, total = connections.len(), "Broadcast notification");
}
