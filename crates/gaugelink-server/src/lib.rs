//! WebSocket state server for the gauge explorer.
//!
//! The server is the control plane between a running visual application and
//! external tooling: it holds the single shared state snapshot, answers
//! request frames from any number of connected clients, broadcasts change
//! notifications to all of them, and forwards navigation / property-change
//! commands to the embedding application without mutating state itself.

pub mod broadcast;
pub mod command;
pub mod connection;
pub mod dispatch;
pub mod server;
pub mod state;

pub use command::Command;
pub use server::StateServer;
pub use state::ServerState;
