//! History entries: reconstructed past states of a record key.
//!
//! Never stored; always derived from the ledger's modification log for a
//! key, in the order the ledger yields it.

use serde::{Deserialize, Serialize};

use crate::{Result, ledger::Modification, record::Record};

/// One past state of a key. `record` is `None` for a tombstone, i.e. the key
/// was deleted at this point in its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  #[serde(rename = "logID")]
  pub record_id: String,
  pub record:    Option<Record>,
  /// Commit time as `seconds.nanoseconds`.
  pub timestamp: String,
  #[serde(rename = "txID")]
  pub tx_id:     String,
  #[serde(rename = "isDelete")]
  pub is_delete: bool,
}

impl HistoryEntry {
  pub fn is_tombstone(&self) -> bool { self.record.is_none() }
}

/// Decode a key's modification log into history entries, one per
/// modification, without reordering or deduplicating.
pub fn fold(key: &str, modifications: Vec<Modification>) -> Result<Vec<HistoryEntry>> {
  modifications
    .into_iter()
    .map(|m| {
      let record = match m.value {
        Some(bytes) if !bytes.is_empty() => Some(Record::decode(key, &bytes)?),
        _ => None,
      };
      Ok(HistoryEntry {
        record_id: key.to_owned(),
        record,
        timestamp: m.timestamp.to_string(),
        tx_id: m.tx_id,
        is_delete: m.is_delete,
      })
    })
    .collect()
}
