//! Error type for `draglog-ledger-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Stored documents are queried as JSON text, so values must be UTF-8.
  #[error("value for key {key:?} is not valid UTF-8")]
  NonUtf8Value { key: String },

  #[error("rich queries are disabled on this ledger")]
  RichQueryDisabled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
