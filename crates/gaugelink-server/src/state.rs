//! Shared server state: the snapshot store and the connection registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};

use gaugelink_core::protocol::Notification;
use gaugelink_core::state::StateSnapshot;

use crate::broadcast::broadcast_notification;
use crate::command::Command;

/// State shared by all connections, the dispatcher, and the embedding
/// application.
pub struct ServerState {
    /// The single authoritative snapshot. Mutation and the resulting
    /// broadcast happen under the write lock, so clients observe
    /// notifications in mutation order.
    pub snapshot: RwLock<StateSnapshot>,

    /// Currently open client connections, keyed by connection id.
    pub connections: RwLock<HashMap<String, ConnectionState>>,

    /// Whether the listener is currently bound.
    pub listening: AtomicBool,

    /// Command sink feeding the embedding application.
    pub commands: mpsc::UnboundedSender<Command>,
}

/// Per-connection state kept in the registry.
pub struct ConnectionState {
    pub conn_id: String,
    pub event_tx: mpsc::UnboundedSender<String>,
}

impl ServerState {
    pub fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            snapshot: RwLock::new(StateSnapshot::default()),
            connections: RwLock::new(HashMap::new()),
            listening: AtomicBool::new(false),
            commands,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Clone of the full snapshot.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Look up one property value by name.
    pub async fn get_property(&self, name: &str) -> Option<Value> {
        self.snapshot.read().await.properties.get(name).cloned()
    }

    /// Set the current page. No-op (and no notification) if unchanged;
    /// otherwise broadcasts `pageChanged` with the stored title.
    pub async fn set_page(&self, page: &str) {
        let mut snapshot = self.snapshot.write().await;
        if snapshot.page == page {
            return;
        }

        snapshot.page = page.to_string();
        let notification = Notification::PageChanged {
            page: snapshot.page.clone(),
            title: snapshot.page_title.clone(),
        };
        broadcast_notification(self, &notification).await;
    }

    /// Set the current page title. No-op if unchanged. Does not broadcast
    /// on its own; the new title rides on the next `pageChanged`.
    pub async fn set_page_title(&self, title: &str) {
        let mut snapshot = self.snapshot.write().await;
        if snapshot.page_title == title {
            return;
        }
        snapshot.page_title = title.to_string();
    }

    /// Replace the entire property map.
    pub async fn set_properties(&self, properties: Map<String, Value>) {
        self.snapshot.write().await.properties = properties;
    }

    /// Replace the entire metadata sequence. Order is preserved verbatim
    /// and defines the order returned by `listProperties`.
    pub async fn set_property_metadata(&self, metadata: Vec<Value>) {
        self.snapshot.write().await.property_metadata = metadata;
    }

    /// Upsert a single property value pushed by the embedding application.
    /// Always broadcasts `propertyChanged`, even for an unchanged value.
    pub async fn update_property(&self, name: &str, value: Value) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.properties.insert(name.to_string(), value.clone());

        let notification = Notification::PropertyChanged {
            name: name.to_string(),
            value,
        };
        broadcast_notification(self, &notification).await;
    }
}
