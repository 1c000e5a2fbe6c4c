//! Configuration and application assembly for the draglog server binary.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use draglog_core::Ledger;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Prefix of environment variables that override file settings, e.g.
/// `DRAGLOG_PORT=9000`.
pub const ENV_PREFIX: &str = "DRAGLOG";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `draglog.toml` and the
/// environment. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub ledger_path:   PathBuf,
  /// Serve selector queries from the ledger's JSON index.
  pub rich_query:    bool,
  /// Create the demo records at startup.
  pub seed_on_start: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".to_owned(),
      port:          8080,
      ledger_path:   PathBuf::from("draglog.db"),
      rich_query:    true,
      seed_on_start: false,
    }
  }
}

impl ServerConfig {
  /// Read `path` (which may be missing) layered under `DRAGLOG_*`
  /// environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::load_with_prefix(path, ENV_PREFIX)
  }

  fn load_with_prefix(path: &Path, prefix: &str) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn resolved_ledger_path(&self) -> PathBuf { expand_tilde(&self.ledger_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application ─────────────────────────────────────────────────────────────

/// The API router with request tracing.
pub fn app<L: Ledger + 'static>(ledger: Arc<L>) -> Router {
  draglog_api::api_router(ledger).layer(TraceLayer::new_for_http())
}
