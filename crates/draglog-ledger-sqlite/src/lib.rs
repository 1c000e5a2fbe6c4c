//! SQLite substrate for the draglog provenance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. World state and the append-only
//! modification log live in two tables of one database file; rich queries
//! are translated to `json_extract` predicates over the stored documents.

mod encode;
mod ledger;
mod schema;

pub mod error;

pub use error::{Error, Result};
pub use ledger::SqliteLedger;
