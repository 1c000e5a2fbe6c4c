//! Handlers for `/feedback` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use draglog_core::{Ledger, Record, RecordType};

use crate::{ApiState, NewRecordBody, Receipt, error::ApiError};

/// `POST /feedback`: body: [`NewRecordBody`]; returns 201 + [`Receipt`].
pub async fn create<L: Ledger>(
  State(state): State<ApiState<L>>,
  Json(body): Json<NewRecordBody>,
) -> Result<impl IntoResponse, ApiError> {
  let commit = state
    .store
    .create_feedback(&body.log_id, body.attributes.into())
    .await?;
  Ok((StatusCode::CREATED, Json(Receipt::new(body.log_id, commit))))
}

/// `GET /feedback`
pub async fn list<L: Ledger>(
  State(state): State<ApiState<L>>,
) -> Result<Json<Vec<Record>>, ApiError> {
  Ok(Json(state.queries.query_by_type(RecordType::Feedback).await?))
}

/// `GET /feedback/{id}`
pub async fn get_one<L: Ledger>(
  State(state): State<ApiState<L>>,
  Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
  Ok(Json(state.store.read_feedback(&id).await?))
}
