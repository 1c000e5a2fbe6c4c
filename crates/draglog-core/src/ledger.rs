//! The `Ledger` trait: the contract required of the substrate.
//!
//! A ledger is an ordered, durable, key-indexed store that keeps every
//! historical value of every key. The [`RecordStore`](crate::RecordStore) and
//! [`QueryEngine`](crate::QueryEngine) depend on this abstraction, not on any
//! concrete backend.
//!
//! Writes are conditional: each `put` names the version it expects to
//! replace, and the ledger applies it atomically or reports a conflict. This
//! is what makes per-key operations linearizable. Two concurrent creators
//! cannot both see the key absent, and two concurrent score updates cannot
//! both replace the same version.

use std::{fmt, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selector::Selector;

// ─── Values ──────────────────────────────────────────────────────────────────

/// The current value of a key and its per-key commit counter (1 for the first
/// write).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  pub value:   Vec<u8>,
  pub version: u64,
}

/// A key with its raw stored bytes, as yielded by scans and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
  pub key:   String,
  pub value: Vec<u8>,
}

/// Precondition attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
  /// The key must not currently exist.
  Absent,
  /// The key must currently be at exactly this version.
  AtVersion(u64),
  /// Unconditional.
  Any,
}

impl Expect {
  /// Whether a key whose current version is `current` satisfies this
  /// precondition.
  pub fn admits(self, current: Option<u64>) -> bool {
    match self {
      Self::Absent => current.is_none(),
      Self::AtVersion(v) => current == Some(v),
      Self::Any => true,
    }
  }
}

/// Commit time of a modification, split the way the ledger reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitTimestamp {
  pub seconds: i64,
  pub nanos:   u32,
}

impl CommitTimestamp {
  pub fn now() -> Self { Self::from(Utc::now()) }
}

impl From<DateTime<Utc>> for CommitTimestamp {
  fn from(dt: DateTime<Utc>) -> Self {
    Self { seconds: dt.timestamp(), nanos: dt.timestamp_subsec_nanos() }
  }
}

/// `seconds.nanoseconds`, with the fractional part zero-padded to nine
/// digits.
impl fmt::Display for CommitTimestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:09}", self.seconds, self.nanos)
  }
}

/// Receipt for an applied write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
  pub tx_id:     String,
  pub timestamp: CommitTimestamp,
  pub version:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
  Committed(Commit),
  /// The precondition did not hold; nothing was written. `current` is the
  /// version the key is actually at.
  Conflict { current: Option<u64> },
}

/// One entry of a key's modification log. `value` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
  pub value:     Option<Vec<u8>>,
  pub timestamp: CommitTimestamp,
  pub tx_id:     String,
  pub is_delete: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a ledger substrate.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Ledger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the current value of `key`. Returns `None` if absent or deleted.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Entry>, Self::Error>> + Send + 'a;

  /// Write `value` under `key` if `expect` holds, appending the previous
  /// value to the key's history.
  fn put<'a>(
    &'a self,
    key: &'a str,
    value: Vec<u8>,
    expect: Expect,
  ) -> impl Future<Output = Result<PutOutcome, Self::Error>> + Send + 'a;

  fn exists<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
    async move { Ok(self.get(key).await?.is_some()) }
  }

  /// Every live key in `[start, end)`, in key order. An empty `start` means
  /// from the first key; an empty `end` means through the last key.
  fn range_scan<'a>(
    &'a self,
    start: &'a str,
    end: &'a str,
  ) -> impl Future<Output = Result<Vec<KeyValue>, Self::Error>> + Send + 'a;

  /// Whether [`Ledger::query`] is backed by a native index. Callers must not
  /// issue queries when this is `false`.
  fn supports_rich_query(&self) -> bool;

  /// Every live key whose value matches `selector`. Result order is
  /// backend-defined.
  fn query<'a>(
    &'a self,
    selector: &'a Selector,
  ) -> impl Future<Output = Result<Vec<KeyValue>, Self::Error>> + Send + 'a;

  /// The modification log of `key`, oldest first. Empty if the key was never
  /// written.
  fn history_of<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<Modification>, Self::Error>> + Send + 'a;
}
