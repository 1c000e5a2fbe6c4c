//! Error types for `draglog-core`.

use thiserror::Error;

use crate::record::RecordType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("record {key} already exists")]
  AlreadyExists { key: String },

  #[error("record {key} does not exist")]
  NotFound { key: String },

  #[error("stored value for {key} is not a valid record: {source}")]
  Deserialization {
    key:    String,
    #[source]
    source: serde_json::Error,
  },

  #[error("record {key} is a {found} record, expected {expected}")]
  TypeMismatch {
    key:      String,
    expected: RecordType,
    found:    RecordType,
  },

  /// The substrate rejected a write because the key changed after it was
  /// read.
  #[error("concurrent modification of record {key}")]
  Conflict { key: String },

  #[error("the ledger does not support rich selector queries")]
  QueryUnsupported,

  #[error("invalid selector: {0}")]
  InvalidSelector(String),

  #[error("invalid record: {0}")]
  InvalidRecord(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("ledger error: {0}")]
  Ledger(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap an opaque substrate error.
  pub fn ledger(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Ledger(Box::new(e))
  }

  pub fn not_found(key: impl Into<String>) -> Self {
    Self::NotFound { key: key.into() }
  }

  pub fn already_exists(key: impl Into<String>) -> Self {
    Self::AlreadyExists { key: key.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
