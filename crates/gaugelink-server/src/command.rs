//! Outbound command events for the embedding application.

use serde_json::Value;
use tokio::sync::mpsc;

/// A request-triggered command for the embedding application to act on.
///
/// Commands are fire-and-forget: the requesting client has already been
/// answered by the time one is emitted, and the server stays correct if the
/// receiver never applies it (or was dropped entirely). State only changes
/// when the application calls back into the server's mutation entrypoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// External tooling asked to show a different page.
    Navigate { page: String },

    /// External tooling asked to change a property value.
    SetProperty { name: String, value: Value },
}

/// Create the command channel handed to the embedding application.
pub fn command_channel() -> (mpsc::UnboundedSender<Command>, mpsc::UnboundedReceiver<Command>) {
    mpsc::unbounded_channel()
}
