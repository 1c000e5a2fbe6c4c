//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] draglog_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use draglog_core::Error as E;
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        E::NotFound { .. } => StatusCode::NOT_FOUND,
        E::AlreadyExists { .. } | E::Conflict { .. } => StatusCode::CONFLICT,
        E::InvalidSelector(_) | E::InvalidRecord(_) => StatusCode::BAD_REQUEST,
        E::TypeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        E::QueryUnsupported => StatusCode::NOT_IMPLEMENTED,
        E::Deserialization { .. } | E::Serialization(_) | E::Ledger(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
      error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
