//! Liveness probe and demo seeding.

use axum::{Json, extract::State};
use draglog_core::Ledger;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{ApiState, error::ApiError};

/// `GET /health`
pub async fn hello() -> Json<Value> {
  Json(json!({ "status": "ok", "message": "hello from draglog" }))
}

#[derive(Debug, Serialize)]
pub struct SeedSummary {
  pub created: usize,
  /// Demo records that already existed.
  pub skipped: usize,
}

/// `POST /seed`: idempotent; existing demo records are left alone.
pub async fn seed<L: Ledger>(
  State(state): State<ApiState<L>>,
) -> Result<Json<SeedSummary>, ApiError> {
  let report = draglog_core::seed::seed_demo_records(&state.store).await?;
  Ok(Json(SeedSummary {
    created: report.created(),
    skipped: report.failures().count(),
  }))
}
