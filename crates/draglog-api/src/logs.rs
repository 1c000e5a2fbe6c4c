//! Handlers for `/logs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/logs` | Body: [`NewRecordBody`]; returns 201 + [`Receipt`] |
//! | `GET`  | `/logs` | Every log record |
//! | `GET`  | `/logs/{id}` | Single log record |
//! | `PUT`  | `/logs/{id}` | Body: [`AttributesBody`]; replaces all attributes |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use draglog_core::{Ledger, Record, RecordType};

use crate::{ApiState, AttributesBody, NewRecordBody, Receipt, error::ApiError};

/// `POST /logs`
pub async fn create<L: Ledger>(
  State(state): State<ApiState<L>>,
  Json(body): Json<NewRecordBody>,
) -> Result<impl IntoResponse, ApiError> {
  let commit = state
    .store
    .create_log(&body.log_id, body.attributes.into())
    .await?;
  Ok((StatusCode::CREATED, Json(Receipt::new(body.log_id, commit))))
}

/// `GET /logs`
pub async fn list<L: Ledger>(
  State(state): State<ApiState<L>>,
) -> Result<Json<Vec<Record>>, ApiError> {
  Ok(Json(state.queries.query_by_type(RecordType::Log).await?))
}

/// `GET /logs/{id}`
pub async fn get_one<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
  Ok(Json(state.store.read_log(&id).await?))
}

/// `PUT /logs/{id}`: returns the stored record.
pub async fn update<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
  Json(body): Json<AttributesBody>,
) -> Result<Json<Record>, ApiError> {
  // Record types are immutable.
  state.store.read_log(&id).await?;
  Ok(Json(state.store.update_full(&id, body.into()).await?))
}
