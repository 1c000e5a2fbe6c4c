//! JSON REST API for draglog.
//!
//! Exposes an axum [`Router`] over the record store and query engine of any
//! [`Ledger`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", draglog_api::api_router(ledger.clone()))
//! ```

pub mod error;
pub mod feedback;
pub mod health;
pub mod logs;
pub mod records;
pub mod reliability;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use draglog_core::{Attributes, Commit, Ledger, QueryEngine, RecordStore};
use serde::{Deserialize, Serialize};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all handlers. Both halves point at the
/// same ledger.
pub struct ApiState<L> {
  pub store:   RecordStore<L>,
  pub queries: QueryEngine<L>,
}

impl<L> Clone for ApiState<L> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), queries: self.queries.clone() }
  }
}

impl<L: Ledger> ApiState<L> {
  pub fn new(ledger: Arc<L>) -> Self {
    Self {
      store:   RecordStore::new(Arc::clone(&ledger)),
      queries: QueryEngine::new(ledger),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `ledger`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<L>(ledger: Arc<L>) -> Router<()>
where
  L: Ledger + 'static,
{
  Router::new()
    .route("/health", get(health::hello))
    .route("/seed", post(health::seed::<L>))
    // Logs
    .route("/logs", get(logs::list::<L>).post(logs::create::<L>))
    .route("/logs/{id}", get(logs::get_one::<L>).put(logs::update::<L>))
    // Feedback
    .route("/feedback", get(feedback::list::<L>).post(feedback::create::<L>))
    .route("/feedback/{id}", get(feedback::get_one::<L>))
    // Reliability
    .route(
      "/reliability",
      get(reliability::list::<L>).post(reliability::create::<L>),
    )
    .route("/reliability/batch", post(reliability::create_batch::<L>))
    .route("/reliability/{id}", get(reliability::get_one::<L>))
    .route("/reliability/{id}/score", put(reliability::update_score::<L>))
    // Records of any type
    .route("/records", get(records::list_all::<L>))
    .route("/records/query", post(records::query::<L>))
    .route("/records/{id}/history", get(records::history::<L>))
    .with_state(ApiState::new(ledger))
}

// ─── Shared bodies ───────────────────────────────────────────────────────────

/// Mutable attributes of a log or feedback record, in wire field names.
/// Absent fields are empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttributesBody {
  #[serde(rename = "loggerID")]
  pub logger_id:  String,
  pub input:      String,
  #[serde(rename = "inputFrom")]
  pub input_from: String,
  pub output:     String,
  #[serde(rename = "outputTo")]
  pub output_to:  String,
  pub timestamp:  String,
  pub reserved:   String,
}

impl From<AttributesBody> for Attributes {
  fn from(b: AttributesBody) -> Self {
    Attributes {
      logger_id:  b.logger_id,
      input:      b.input,
      input_from: b.input_from,
      output:     b.output,
      output_to:  b.output_to,
      timestamp:  b.timestamp,
      reserved:   b.reserved,
    }
  }
}

/// JSON body accepted by `POST /logs` and `POST /feedback`.
#[derive(Debug, Deserialize)]
pub struct NewRecordBody {
  #[serde(rename = "logID", alias = "recordID")]
  pub log_id:     String,
  #[serde(flatten)]
  pub attributes: AttributesBody,
}

/// Returned with `201 Created` for every successful create.
#[derive(Debug, Serialize)]
pub struct Receipt {
  #[serde(rename = "logID")]
  pub log_id:    String,
  #[serde(rename = "txID")]
  pub tx_id:     String,
  pub timestamp: String,
}

impl Receipt {
  pub fn new(log_id: impl Into<String>, commit: Commit) -> Self {
    Self {
      log_id:    log_id.into(),
      tx_id:     commit.tx_id,
      timestamp: commit.timestamp.to_string(),
    }
  }
}
