use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studymap_api::AppEventPayload;
use studymap_app::{AppConfig, VisualizerController};
use studymap_content::{MathSolverClient, SolverError, build_content_source};
use studymap_events::EventBus;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod routes;

use routes::ServerState;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON config file; `STUDYMAP_*` variables and flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Base URL of the whiteboard math backend
    #[arg(long)]
    math_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = args.math_url {
        config.math.base_url = Some(url);
    }

    let source =
        build_content_source(&config.content).context("Failed to build content source")?;
    let math = match MathSolverClient::from_config(&config.math) {
        Ok(client) => Some(client),
        Err(SolverError::NotConfigured) => {
            info!("No math backend configured; whiteboard solving is disabled");
            None
        }
        Err(err) => return Err(err).context("Failed to build math backend client"),
    };

    let bus = EventBus::new();
    let controller = VisualizerController::spawn(source.clone(), config.layout, bus.clone());

    let (events_tx, _) = broadcast::channel::<AppEventPayload>(512);
    {
        let events_rx = bus.receiver();
        let events_tx = events_tx.clone();
        std::thread::spawn(move || {
            while let Ok(event) = events_rx.recv() {
                if let Some(payload) = AppEventPayload::from_event(&event) {
                    let _ = events_tx.send(payload);
                }
            }
        });
    }

    let state = Arc::new(ServerState {
        controller,
        source,
        math,
        events_tx,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Failed to parse server address")?;
    info!(%addr, "Starting studymap server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
