//! petcal-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `PETCAL_*` environment variables, builds an in-memory calendar store and
//! serves the sync WebSocket, the management endpoints and the read API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use petcal_realtime::{
  AppState,
  RealtimeConfig,
  ServerConfig,
  SyncService,
  liveness::LivenessMonitor,
};
use petcal_store_memory::MemoryStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pet content calendar sync server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PETCAL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  let realtime_cfg = RealtimeConfig::from(&server_cfg);

  let store = Arc::new(MemoryStore::new());
  let service = Arc::new(SyncService::new(store, realtime_cfg.clone()));
  let monitor = LivenessMonitor::spawn(service.hub().clone(), &realtime_cfg);

  let app = petcal_realtime::router(AppState { service: service.clone() });
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
      }
      tracing::info!("shutting down");
      monitor.stop();
      service.shutdown();
    })
    .await
    .context("server error")?;

  Ok(())
}
