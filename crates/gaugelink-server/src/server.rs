//! Listener lifecycle and the embedding-application API.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gaugelink_core::error::{GaugelinkError, Result};
use gaugelink_core::state::StateSnapshot;

use crate::command::{command_channel, Command};
use crate::connection::handle_socket;
use crate::state::ServerState;

/// The state server: owns the snapshot, the connection registry, and the
/// listener lifecycle.
///
/// The embedding application holds this handle to push authoritative state
/// in (page, title, properties, metadata) and receives command events on
/// the channel returned by [`StateServer::new`]. Remote clients connect to
/// `ws://127.0.0.1:<port>/ws`.
pub struct StateServer {
    state: Arc<ServerState>,
    run: Mutex<Option<RunHandle>>,
}

struct RunHandle {
    port: u16,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

#[derive(Clone)]
struct AppState {
    state: Arc<ServerState>,
    shutdown: CancellationToken,
}

impl StateServer {
    /// Create a server plus the command receiver for the embedding
    /// application. The server is not listening until [`start`] is called.
    ///
    /// [`start`]: StateServer::start
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (command_tx, command_rx) = command_channel();
        let server = Self {
            state: Arc::new(ServerState::new(command_tx)),
            run: Mutex::new(None),
        };
        (server, command_rx)
    }

    /// Shared state handle, for embedders that need direct access.
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub fn is_listening(&self) -> bool {
        self.state.is_listening()
    }

    /// Bind `127.0.0.1:port` and start accepting connections.
    ///
    /// Idempotent while listening: a second call succeeds without
    /// rebinding. A bind failure leaves the server in the not-listening
    /// state; whether that is fatal is the caller's decision.
    pub async fn start(&self, port: u16) -> Result<()> {
        let mut run = self.run.lock().await;
        if let Some(handle) = run.as_ref() {
            warn!(port = handle.port, "State server already listening");
            return Ok(());
        }

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| {
                GaugelinkError::Server(format!("failed to listen on port {port}: {e}"))
            })?;

        let shutdown = CancellationToken::new();
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(AppState {
                state: Arc::clone(&self.state),
                shutdown: shutdown.clone(),
            });

        self.state.listening.store(true, Ordering::SeqCst);

        let serve_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(serve_shutdown.cancelled_owned())
                .await;
            if let Err(e) = result {
                warn!(%e, "State server exited with error");
            }
        });

        *run = Some(RunHandle {
            port,
            shutdown,
            task,
        });
        info!("State server listening on ws://127.0.0.1:{port}/ws");
        Ok(())
    }

    /// Stop listening and forcibly close every client connection.
    ///
    /// Idempotent and safe to call when never started. In-flight responses
    /// may be lost; there is no drain.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return;
        };

        self.state.listening.store(false, Ordering::SeqCst);
        handle.shutdown.cancel();
        let _ = handle.task.await;
        self.state.connections.write().await.clear();
        info!("State server stopped");
    }

    // ---- Inbound state-mutation entrypoints for the embedding application.
    // Kept separate from the outbound command channel: commands never
    // mutate state, and these mutations never wait on a client.

    /// Set the authoritative current page. Broadcasts `pageChanged` to all
    /// clients unless the value is unchanged.
    pub async fn set_current_page(&self, page: &str) {
        self.state.set_page(page).await;
    }

    /// Set the current page title. No broadcast of its own.
    pub async fn set_current_page_title(&self, title: &str) {
        self.state.set_page_title(title).await;
    }

    /// Replace the whole property map.
    pub async fn set_properties(&self, properties: Map<String, Value>) {
        self.state.set_properties(properties).await;
    }

    /// Replace the property metadata sequence (defines `listProperties`
    /// order).
    pub async fn set_property_metadata(&self, metadata: Vec<Value>) {
        self.state.set_property_metadata(metadata).await;
    }

    /// Push one property value. Broadcasts `propertyChanged` to all
    /// clients, even when the value is unchanged.
    pub async fn update_property(&self, name: &str, value: Value) {
        self.state.update_property(name, value).await;
    }

    /// Clone of the current snapshot.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot().await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app.state, socket, app.shutdown))
}

async fn health_handler(State(app): State<AppState>) -> impl IntoResponse {
    let connections = app.state.connections.read().await.len();

    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": connections,
    }))
}
