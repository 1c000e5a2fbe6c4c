//! [`QueryEngine`]: selector queries, full scans, and history reads.

use std::sync::Arc;

use tracing::debug;

use crate::{
  Error, Result,
  history::{self, HistoryEntry},
  ledger::{KeyValue, Ledger},
  record::{Record, RecordType},
  selector::{Field, Operator, Selector},
};

/// Read-side operations against a shared ledger handle.
///
/// Cloning is cheap: the ledger is reference-counted.
pub struct QueryEngine<L> {
  ledger: Arc<L>,
}

impl<L> Clone for QueryEngine<L> {
  fn clone(&self) -> Self { Self { ledger: Arc::clone(&self.ledger) } }
}

impl<L: Ledger> QueryEngine<L> {
  pub fn new(ledger: Arc<L>) -> Self { Self { ledger } }

  /// Every record matching `selector`, in ledger-defined order. Fails with
  /// [`Error::QueryUnsupported`] if the ledger has no rich-query capability.
  pub async fn query_by_selector(&self, selector: &Selector) -> Result<Vec<Record>> {
    if !self.ledger.supports_rich_query() {
      return Err(Error::QueryUnsupported);
    }
    debug!(%selector, "selector query");
    let rows = self.ledger.query(selector).await.map_err(Error::ledger)?;
    decode_all(rows)
  }

  /// Parse and validate a selector document, then run it.
  pub async fn query_json(&self, json: &str) -> Result<Vec<Record>> {
    self.query_by_selector(&Selector::parse(json)?).await
  }

  pub async fn query_by_type(&self, record_type: RecordType) -> Result<Vec<Record>> {
    self.query_by_selector(&Selector::by_type(record_type)).await
  }

  /// Records of `record_type` stored under `id`; at most one.
  pub async fn query_by_type_and_id(
    &self,
    record_type: RecordType,
    id: &str,
  ) -> Result<Vec<Record>> {
    let selector = Selector::by_type(record_type).and(Field::LogId, Operator::Eq, id)?;
    self.query_by_selector(&selector).await
  }

  /// Every record in key order. O(total keys); intended for administrative
  /// use and ledgers without a secondary index.
  pub async fn range_all(&self) -> Result<Vec<Record>> {
    let rows = self.ledger.range_scan("", "").await.map_err(Error::ledger)?;
    decode_all(rows)
  }

  /// The full audit trail of `key`, oldest first. Empty if the key was never
  /// written.
  pub async fn history_of(&self, key: &str) -> Result<Vec<HistoryEntry>> {
    let modifications = self.ledger.history_of(key).await.map_err(Error::ledger)?;
    history::fold(key, modifications)
  }
}

fn decode_all(rows: Vec<KeyValue>) -> Result<Vec<Record>> {
  rows
    .into_iter()
    .map(|kv| Record::decode(&kv.key, &kv.value))
    .collect()
}
