//! Handlers for `/reliability` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/reliability` | Body: [`NewSourceBody`]; score starts at 100 |
//! | `POST` | `/reliability/batch` | Body: list of [`NewSourceBody`]; per-item results |
//! | `GET`  | `/reliability` | Every reliability record |
//! | `GET`  | `/reliability/{id}` | Single reliability record |
//! | `PUT`  | `/reliability/{id}/score` | Body: [`ScoreBody`] |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use draglog_core::{BatchOutcome, Ledger, Record, RecordType};
use serde::{Deserialize, Serialize};

use crate::{ApiState, Receipt, error::ApiError};

/// JSON body accepted by `POST /reliability`.
#[derive(Debug, Deserialize)]
pub struct NewSourceBody {
  #[serde(rename = "dataSourceID", alias = "logID")]
  pub data_source_id: String,
  /// Stored as the record's `input`.
  #[serde(default)]
  pub digest:         String,
  #[serde(default)]
  pub reserved:       String,
}

/// `POST /reliability`
pub async fn create<L: Ledger>(
  State(state): State<ApiState<L>>,
  Json(body): Json<NewSourceBody>,
) -> Result<impl IntoResponse, ApiError> {
  let commit = state
    .store
    .create_reliability(&body.data_source_id, &body.digest, &body.reserved)
    .await?;
  Ok((StatusCode::CREATED, Json(Receipt::new(body.data_source_id, commit))))
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// One element of the `POST /reliability/batch` response.
#[derive(Debug, Serialize)]
pub struct BatchItem {
  #[serde(rename = "dataSourceID")]
  pub data_source_id: String,
  pub created:        bool,
  #[serde(rename = "txID", skip_serializing_if = "Option::is_none")]
  pub tx_id:          Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:          Option<String>,
}

impl From<BatchOutcome> for BatchItem {
  fn from(o: BatchOutcome) -> Self {
    let (tx_id, error) = match o.result {
      Ok(commit) => (Some(commit.tx_id), None),
      Err(e) => (None, Some(e.to_string())),
    };
    Self {
      data_source_id: o.record_id,
      created: tx_id.is_some(),
      tx_id,
      error,
    }
  }
}

/// `POST /reliability/batch`: not atomic; always `200` with one
/// [`BatchItem`] per input, in input order.
pub async fn create_batch<L: Ledger>(
  State(state): State<ApiState<L>>,
  Json(body): Json<Vec<NewSourceBody>>,
) -> Result<Json<Vec<BatchItem>>, ApiError> {
  let sources = body
    .into_iter()
    .map(|b| (b.data_source_id, b.digest, b.reserved));
  let report = state.store.create_reliability_batch(sources).await;
  Ok(Json(report.outcomes.into_iter().map(BatchItem::from).collect()))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /reliability`
pub async fn list<L: Ledger>(
  State(state): State<ApiState<L>>,
) -> Result<Json<Vec<Record>>, ApiError> {
  Ok(Json(state.queries.query_by_type(RecordType::Reliability).await?))
}

/// `GET /reliability/{id}`
pub async fn get_one<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
  Ok(Json(state.store.read_reliability(&id).await?))
}

// ─── Score ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoreBody {
  #[serde(rename = "reliabilityScore")]
  pub reliability_score: f64,
  /// Add to the current score instead of replacing it.
  #[serde(rename = "isDelta", default)]
  pub is_delta:          bool,
}

/// `PUT /reliability/{id}/score`: returns the stored record.
pub async fn update_score<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
  Json(body): Json<ScoreBody>,
) -> Result<Json<Record>, ApiError> {
  if !body.reliability_score.is_finite() {
    return Err(ApiError::BadRequest("reliabilityScore must be finite".into()));
  }
  let record = state
    .store
    .update_score(&id, body.reliability_score, body.is_delta)
    .await?;
  Ok(Json(record))
}
