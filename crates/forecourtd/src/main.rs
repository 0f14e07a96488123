//! forecourtd - Forecourt integration hub daemon
//!
//! Discovers the operator's backend services on their configured ports,
//! polls registered data endpoints into the canonical store, serves the
//! REST API, and streams realtime events over WebSocket.
//!
//! Usage:
//!   forecourtd [OPTIONS] [config.toml]
//!
//! Options:
//!   -p, --port <port>      Override the listen port
//!   -d, --database <path>  Override the SQLite database path

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use forecourt_aggregate::{MetricsService, Poller};
use forecourt_api::{create_router, AppState};
use forecourt_core::config::ForecourtConfig;
use forecourt_discovery::DiscoveryService;
use forecourt_store::{EndpointCatalog, RecordStore, SqliteStore};
use forecourt_stream::StreamHub;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Daemon config file (TOML)
    config_path: Option<String>,
    port: Option<u16>,
    database: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        port: None,
        database: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(port) => result.port = Some(port),
                        Err(_) => tracing::error!("Invalid value for --port: {}", args[i + 1]),
                    }
                    i += 2;
                } else {
                    tracing::error!("Missing argument for --port");
                    i += 1;
                }
            }
            "--database" | "-d" => {
                if i + 1 < args.len() {
                    result.database = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    tracing::error!("Missing argument for --database");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"forecourtd - Forecourt integration hub daemon

Usage: forecourtd [OPTIONS] [config.toml]

Options:
  -p, --port <port>      Override the listen port
  -d, --database <path>  Override the SQLite database path
  -h, --help             Print this help message

Environment:
  FORECOURT_PORT         Same as --port
  FORECOURT_DB           Same as --database

Examples:
  # Run with built-in defaults (scans ports 8001-8005)
  forecourtd

  # Run with a config file
  forecourtd forecourt.toml

  # Run against a different database
  forecourtd -d /var/lib/forecourt/hub.db forecourt.toml
"#
    );
}

fn load_config(path: Option<&str>) -> anyhow::Result<ForecourtConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            Ok(ForecourtConfig::default())
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forecourtd=info,forecourt_api=info,forecourt_discovery=info,forecourt_aggregate=info,forecourt_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting forecourtd (forecourt integration hub)");

    let args = parse_args();
    let mut config = load_config(args.config_path.as_deref())?;

    // Environment overrides, then CLI overrides on top
    if let Ok(port) = std::env::var("FORECOURT_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid FORECOURT_PORT: {}", port),
        }
    }
    if let Ok(path) = std::env::var("FORECOURT_DB") {
        config.database.path = path;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.database {
        config.database.path = path;
    }

    // Durable store backs both the record repository and the endpoint catalog
    let store = Arc::new(SqliteStore::connect(&config.database.path).await?);
    let catalog: Arc<dyn EndpointCatalog> = store.clone();
    let records: Arc<dyn RecordStore> = store.clone();

    let discovery = Arc::new(DiscoveryService::new(config.discovery.clone())?);
    let hub = StreamHub::new(&config.stream);
    let metrics = Arc::new(MetricsService::new(records.clone()));
    let poller = Poller::new(
        catalog.clone(),
        records,
        hub.clone(),
        Duration::from_millis(config.discovery.request_timeout_ms),
    )?;

    let watching = poller.start().await?;
    tracing::info!(watching, "Polling scheduled for registered endpoints");

    // Heartbeat sweep keeps the subscriber registry honest
    let sweep_hub = hub.clone();
    let heartbeat = Duration::from_secs(config.stream.heartbeat_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_hub.sweep(chrono::Utc::now());
        }
    });

    let state = AppState::new(
        discovery,
        poller.clone(),
        metrics,
        hub.clone(),
        catalog,
        config.polling.clone(),
    );
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop timers and close subscriber connections; in-flight requests are
    // left to finish and their results discarded.
    poller.shutdown();
    hub.shutdown();
    tracing::info!("forecourtd stopped");

    Ok(())
}
