//! Shared protocol types, state model, config, and errors for Gaugelink.

pub mod config;
pub mod error;
pub mod protocol;
pub mod state;
