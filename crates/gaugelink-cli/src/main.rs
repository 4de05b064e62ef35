use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use gaugelink_server::{Command, StateServer};

#[derive(Parser)]
#[command(
    name = "gaugelink",
    about = "State server for the gauge explorer — expose and drive live application state over WebSocket",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a standalone state server that applies incoming commands to its
    /// own store (navigation sets the page, setProperty becomes a push)
    Serve {
        /// Port to listen on (default: 9876, or GAUGELINK_STATE_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ping a running state server
    Ping {
        /// Server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send one raw request frame and print the response
    Send {
        /// Request JSON, e.g. '{"action":"getState"}'
        frame: String,

        /// Server port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(gaugelink_core::config::Config::config_path);
    let config = gaugelink_core::config::Config::load(&config_path)?;

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.server_port());
            serve(port).await?;
        }
        Commands::Ping { port } => {
            let port = port.unwrap_or_else(|| config.server_port());
            let response = roundtrip(port, json!({"action": "ping"})).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Send { frame, port } => {
            let request: Value = serde_json::from_str(&frame)
                .map_err(|e| anyhow::anyhow!("Invalid request JSON: {e}"))?;
            let port = port.unwrap_or_else(|| config.server_port());
            let response = roundtrip(port, request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Run the server until ctrl-c, applying command events straight back into
/// the store. This loopback collaborator stands in for an embedding
/// application, which would instead decide how (or whether) to apply each
/// command.
async fn serve(port: u16) -> anyhow::Result<()> {
    let (server, mut command_rx) = StateServer::new();
    server.start(port).await?;

    let state = server.state();
    let apply_task = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                Command::Navigate { page } => {
                    tracing::info!(%page, "Applying navigation");
                    state.set_page_title(&page).await;
                    state.set_page(&page).await;
                }
                Command::SetProperty { name, value } => {
                    tracing::info!(%name, "Applying property change");
                    state.update_property(&name, value).await;
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.stop().await;
    apply_task.abort();

    Ok(())
}

/// Connect, send one request frame, and return the response, skipping any
/// interleaved notifications.
async fn roundtrip(port: u16, request: Value) -> anyhow::Result<Value> {
    let url = format!("ws://127.0.0.1:{port}/ws");
    let (mut ws, _) = connect_async(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {url}: {e}"))?;

    ws.send(Message::Text(request.to_string().into())).await?;

    while let Some(msg) = ws.next().await {
        let msg = msg?;
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(text.as_str())?;
            if frame.get("success").is_some() {
                ws.close(None).await.ok();
                return Ok(frame);
            }
        }
    }

    anyhow::bail!("Connection closed before a response arrived")
}
