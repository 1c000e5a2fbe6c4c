//! Handlers for type-agnostic `/records` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use draglog_core::{HistoryEntry, Ledger, Record, Selector};
use serde_json::Value;

use crate::{ApiState, error::ApiError};

/// `POST /records/query`: body is a selector document, either
/// `{"selector": {...}}` or a bare field map.
pub async fn query<L: Ledger>(
  State(state): State<ApiState<L>>,
  Json(body): Json<Value>,
) -> Result<Json<Vec<Record>>, ApiError> {
  let selector = Selector::from_json(&body)?;
  Ok(Json(state.queries.query_by_selector(&selector).await?))
}

/// `GET /records`: every record in key order.
pub async fn list_all<L: Ledger>(
  State(state): State<ApiState<L>>,
) -> Result<Json<Vec<Record>>, ApiError> {
  Ok(Json(state.queries.range_all().await?))
}

/// `GET /records/{id}/history`: oldest first; empty for unknown keys.
pub async fn history<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
  Ok(Json(state.queries.history_of(&id).await?))
}
