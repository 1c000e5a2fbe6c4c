//! Core types and trait definitions for the draglog provenance store.
//!
//! Every stage of a retrieval pipeline (sources, rerankers, downstream
//! consumers) writes a [`Record`] describing what it consumed and produced;
//! every data source carries a mutable reliability score. Records live in a
//! [`Ledger`] substrate that keeps every prior version of every key, so the
//! full change history of a record stays auditable.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! [`RecordStore`] and [`QueryEngine`] work against any [`Ledger`]
//! implementation; [`MemoryLedger`] is the in-process one.

pub mod error;
pub mod history;
pub mod ledger;
pub mod memory;
pub mod query;
pub mod record;
pub mod seed;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
pub use history::HistoryEntry;
pub use ledger::{
  Commit, CommitTimestamp, Entry, Expect, KeyValue, Ledger, Modification, PutOutcome,
};
pub use memory::MemoryLedger;
pub use query::QueryEngine;
pub use record::{Attributes, Kind, Record, RecordType};
pub use selector::{Clause, Field, Operator, Selector};
pub use store::{BatchOutcome, BatchReport, RecordStore};

#[cfg(test)]
mod tests;
