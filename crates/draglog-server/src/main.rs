//! draglog server binary.
//!
//! Reads `draglog.toml` (or the path specified with `--config`), opens the
//! SQLite ledger, and serves the JSON API over HTTP until interrupted.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use draglog_core::{RecordStore, seed};
use draglog_ledger_sqlite::SqliteLedger;
use draglog_server::ServerConfig;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "draglog provenance ledger server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "draglog.toml")]
  config: PathBuf,

  /// Create the demo records before serving, regardless of configuration.
  #[arg(long)]
  seed: bool,
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let ledger_path = server_cfg.resolved_ledger_path();
  let ledger = SqliteLedger::open(&ledger_path)
    .await
    .with_context(|| format!("failed to open ledger at {ledger_path:?}"))?
    .with_rich_query(server_cfg.rich_query);
  let ledger = Arc::new(ledger);

  if cli.seed || server_cfg.seed_on_start {
    seed::seed_demo_records(&RecordStore::new(Arc::clone(&ledger)))
      .await
      .context("failed to seed demo records")?;
  }

  let app = draglog_server::app(Arc::clone(&ledger));
  let address = server_cfg.address();

  info!(ledger = %ledger_path.display(), "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("Shutdown complete, closing ledger");
  match Arc::try_unwrap(ledger) {
    Ok(ledger) => ledger.close().await.context("failed to close ledger")?,
    Err(_) => warn!("ledger still in use at shutdown; leaving it to drop"),
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!("Shutdown signal received");
}
