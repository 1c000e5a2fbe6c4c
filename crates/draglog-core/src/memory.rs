//! [`MemoryLedger`]: an in-process [`Ledger`] substrate.
//!
//! Keeps world state and per-key modification logs in a single
//! mutex-guarded map, so every write is trivially serialised. Useful for
//! tests and for embedding the store without a database. Rich queries can be
//! switched off to model a ledger that has no secondary index.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  ledger::{
    Commit, CommitTimestamp, Entry, Expect, KeyValue, Ledger, Modification,
    PutOutcome,
  },
  selector::Selector,
};

#[derive(Debug, Error)]
pub enum MemoryLedgerError {
  #[error("rich queries are disabled on this ledger")]
  RichQueryDisabled,
}

#[derive(Default)]
struct KeyState {
  current:  Option<Entry>,
  /// Last version ever assigned; survives deletion.
  version:  u64,
  history:  Vec<Modification>,
}

pub struct MemoryLedger {
  keys:       Mutex<BTreeMap<String, KeyState>>,
  rich_query: bool,
}

impl Default for MemoryLedger {
  fn default() -> Self { Self::new() }
}

impl MemoryLedger {
  pub fn new() -> Self {
    Self { keys: Mutex::new(BTreeMap::new()), rich_query: true }
  }

  /// A ledger whose [`Ledger::supports_rich_query`] is `false`.
  pub fn without_rich_query() -> Self {
    Self { rich_query: false, ..Self::new() }
  }

  /// Delete `key`, recording a tombstone in its history. Returns `None` if
  /// the key was not live.
  pub fn delete(&self, key: &str) -> Option<Commit> {
    let mut keys = self.keys.lock();
    let state = keys.get_mut(key)?;
    state.current.take()?;
    let commit = next_commit(state);
    state.history.push(Modification {
      value:     None,
      timestamp: commit.timestamp,
      tx_id:     commit.tx_id.clone(),
      is_delete: true,
    });
    Some(commit)
  }

  fn live_pairs(&self, keep: impl Fn(&str, &[u8]) -> bool) -> Vec<KeyValue> {
    self
      .keys
      .lock()
      .iter()
      .filter_map(|(key, state)| {
        let entry = state.current.as_ref()?;
        keep(key, &entry.value).then(|| KeyValue {
          key:   key.clone(),
          value: entry.value.clone(),
        })
      })
      .collect()
  }
}

fn next_commit(state: &mut KeyState) -> Commit {
  state.version += 1;
  Commit {
    tx_id:     Uuid::new_v4().simple().to_string(),
    timestamp: CommitTimestamp::now(),
    version:   state.version,
  }
}

impl Ledger for MemoryLedger {
  type Error = MemoryLedgerError;

  async fn get(&self, key: &str) -> Result<Option<Entry>, Self::Error> {
    Ok(self.keys.lock().get(key).and_then(|s| s.current.clone()))
  }

  async fn put(
    &self,
    key: &str,
    value: Vec<u8>,
    expect: Expect,
  ) -> Result<PutOutcome, Self::Error> {
    let mut keys = self.keys.lock();
    let current = keys
      .get(key)
      .and_then(|s| s.current.as_ref())
      .map(|e| e.version);
    if !expect.admits(current) {
      return Ok(PutOutcome::Conflict { current });
    }

    let state = keys.entry(key.to_owned()).or_default();
    let commit = next_commit(state);
    state.history.push(Modification {
      value:     Some(value.clone()),
      timestamp: commit.timestamp,
      tx_id:     commit.tx_id.clone(),
      is_delete: false,
    });
    state.current = Some(Entry { value, version: commit.version });
    Ok(PutOutcome::Committed(commit))
  }

  async fn range_scan(
    &self,
    start: &str,
    end: &str,
  ) -> Result<Vec<KeyValue>, Self::Error> {
    Ok(self.live_pairs(|key, _| {
      key >= start && (end.is_empty() || key < end)
    }))
  }

  fn supports_rich_query(&self) -> bool { self.rich_query }

  async fn query(&self, selector: &Selector) -> Result<Vec<KeyValue>, Self::Error> {
    if !self.rich_query {
      return Err(MemoryLedgerError::RichQueryDisabled);
    }
    Ok(self.live_pairs(|_, value| {
      serde_json::from_slice::<serde_json::Value>(value)
        .is_ok_and(|doc| selector.matches(&doc))
    }))
  }

  async fn history_of(&self, key: &str) -> Result<Vec<Modification>, Self::Error> {
    Ok(
      self
        .keys
        .lock()
        .get(key)
        .map(|s| s.history.clone())
        .unwrap_or_default(),
    )
  }
}
