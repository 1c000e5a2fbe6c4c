//! [`RecordStore`]: typed create/read/update operations over a [`Ledger`].
//!
//! Owns the record schema rules: a key is created exactly once regardless of
//! type, a record's type never changes, and reliability scores move only
//! through [`RecordStore::update_score`]. Every mutation is one conditional
//! `put`, so a failed operation leaves nothing behind.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
  Error, Result,
  ledger::{Commit, Expect, Ledger, PutOutcome},
  record::{Attributes, Kind, Record, RecordType},
};

// ─── Batch results ───────────────────────────────────────────────────────────

/// The result of creating one record of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
  pub record_id: String,
  pub result:    Result<Commit>,
}

/// Per-item results of [`RecordStore::create_batch`]. A batch is not a
/// transaction: items that succeeded stay committed even when later ones
/// fail.
#[derive(Debug, Default)]
pub struct BatchReport {
  pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
  pub fn created(&self) -> usize {
    self.outcomes.iter().filter(|o| o.result.is_ok()).count()
  }

  pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
    self.outcomes.iter().filter(|o| o.result.is_err())
  }

  pub fn all_created(&self) -> bool { self.outcomes.iter().all(|o| o.result.is_ok()) }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Typed record operations against a shared ledger handle.
///
/// Cloning is cheap: the ledger is reference-counted.
pub struct RecordStore<L> {
  ledger: Arc<L>,
}

impl<L> Clone for RecordStore<L> {
  fn clone(&self) -> Self { Self { ledger: Arc::clone(&self.ledger) } }
}

impl<L: Ledger> RecordStore<L> {
  pub fn new(ledger: Arc<L>) -> Self { Self { ledger } }

  pub fn ledger(&self) -> &Arc<L> { &self.ledger }

  pub async fn exists(&self, key: &str) -> Result<bool> {
    self.ledger.exists(key).await.map_err(Error::ledger)
  }

  // ── Create ────────────────────────────────────────────────────────────

  /// Persist a new record. Fails with [`Error::AlreadyExists`] if any record,
  /// of any type, already lives at the same key.
  pub async fn create(&self, record: Record) -> Result<Commit> {
    let key = record.record_id.as_str();
    if self.exists(key).await? {
      return Err(Error::already_exists(key));
    }

    match self.put(&record, Expect::Absent).await? {
      PutOutcome::Committed(commit) => {
        debug!(
          key,
          record_type = %record.record_type(),
          tx_id = %commit.tx_id,
          "created record"
        );
        Ok(commit)
      }
      // Lost a race against another creator.
      PutOutcome::Conflict { .. } => Err(Error::already_exists(key)),
    }
  }

  pub async fn create_log(
    &self,
    log_id: &str,
    attributes: Attributes,
  ) -> Result<Commit> {
    self.create(Record::log(log_id, attributes)?).await
  }

  pub async fn create_feedback(
    &self,
    log_id: &str,
    attributes: Attributes,
  ) -> Result<Commit> {
    self.create(Record::feedback(log_id, attributes)?).await
  }

  /// Register a data source with the default score.
  pub async fn create_reliability(
    &self,
    data_source_id: &str,
    digest: &str,
    reserved: &str,
  ) -> Result<Commit> {
    self
      .create(Record::reliability(data_source_id, digest, reserved)?)
      .await
  }

  /// Create each record independently, in order, and report every outcome.
  pub async fn create_batch(
    &self,
    records: impl IntoIterator<Item = Record>,
  ) -> BatchReport {
    self
      .create_each(records.into_iter().map(|r| (r.record_id.clone(), Ok(r))))
      .await
  }

  /// Register each `(data_source_id, digest, reserved)` source with the
  /// default score. Sources that fail validation are reported alongside
  /// those rejected by the ledger.
  pub async fn create_reliability_batch(
    &self,
    sources: impl IntoIterator<Item = (String, String, String)>,
  ) -> BatchReport {
    self
      .create_each(sources.into_iter().map(|(id, digest, reserved)| {
        let record = Record::reliability(id.clone(), digest, reserved);
        (id, record)
      }))
      .await
  }

  async fn create_each(
    &self,
    records: impl IntoIterator<Item = (String, Result<Record>)>,
  ) -> BatchReport {
    let mut report = BatchReport::default();
    for (record_id, record) in records {
      let result = match record {
        Ok(record) => self.create(record).await,
        Err(e) => Err(e),
      };
      if let Err(e) = &result {
        warn!(key = %record_id, error = %e, "batch item not created");
      }
      report.outcomes.push(BatchOutcome { record_id, result });
    }
    report
  }

  // ── Read ──────────────────────────────────────────────────────────────

  /// Read whatever record lives at `key`.
  pub async fn read(&self, key: &str) -> Result<Record> {
    self.read_versioned(key).await.map(|(record, _)| record)
  }

  /// Read the record at `key`, failing with [`Error::TypeMismatch`] if it is
  /// not of the `expected` type.
  pub async fn read_typed(&self, key: &str, expected: RecordType) -> Result<Record> {
    let record = self.read(key).await?;
    check_type(&record, expected)?;
    Ok(record)
  }

  pub async fn read_log(&self, log_id: &str) -> Result<Record> {
    self.read_typed(log_id, RecordType::Log).await
  }

  pub async fn read_feedback(&self, log_id: &str) -> Result<Record> {
    self.read_typed(log_id, RecordType::Feedback).await
  }

  pub async fn read_reliability(&self, data_source_id: &str) -> Result<Record> {
    self.read_typed(data_source_id, RecordType::Reliability).await
  }

  async fn read_versioned(&self, key: &str) -> Result<(Record, u64)> {
    let entry = self
      .ledger
      .get(key)
      .await
      .map_err(Error::ledger)?
      .ok_or_else(|| Error::not_found(key))?;
    let record = Record::decode(key, &entry.value)?;
    Ok((record, entry.version))
  }

  // ── Update ────────────────────────────────────────────────────────────

  /// Replace every mutable attribute of the record at `key`. The type, and a
  /// reliability record's score, are kept. Returns the stored record.
  pub async fn update_full(&self, key: &str, attributes: Attributes) -> Result<Record> {
    let (mut record, version) = self.read_for_update(key).await?;
    record.attributes = attributes;
    self.replace(key, &record, version).await?;
    debug!(key, record_type = %record.record_type(), "updated record");
    Ok(record)
  }

  /// Set (`is_delta == false`) or adjust (`is_delta == true`) the score of
  /// the reliability record at `key`. Returns the stored record.
  pub async fn update_score(
    &self,
    key: &str,
    score: f64,
    is_delta: bool,
  ) -> Result<Record> {
    let (mut record, version) = self.read_for_update(key).await?;
    let Kind::Reliability { score: current } = record.kind else {
      return Err(Error::TypeMismatch {
        key:      key.to_owned(),
        expected: RecordType::Reliability,
        found:    record.record_type(),
      });
    };

    let next = if is_delta { current + score } else { score };
    if !next.is_finite() {
      return Err(Error::InvalidRecord(format!(
        "score update on {key} would leave a non-finite score ({next})"
      )));
    }
    record.kind = Kind::Reliability { score: next };
    self.replace(key, &record, version).await?;
    debug!(key, from = current, to = next, is_delta, "updated reliability score");
    Ok(record)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn put(&self, record: &Record, expect: Expect) -> Result<PutOutcome> {
    let bytes = record.encode()?;
    self
      .ledger
      .put(&record.record_id, bytes, expect)
      .await
      .map_err(Error::ledger)
  }

  /// Read a record that is about to be rewritten. The stored `logID` must
  /// name the key it lives under.
  async fn read_for_update(&self, key: &str) -> Result<(Record, u64)> {
    let (record, version) = self.read_versioned(key).await?;
    if record.record_id != key {
      return Err(Error::InvalidRecord(format!(
        "record stored under {key} is labelled {}",
        record.record_id
      )));
    }
    Ok((record, version))
  }

  /// Overwrite the record at `key`, read at `version`.
  async fn replace(&self, key: &str, record: &Record, version: u64) -> Result<Commit> {
    let bytes = record.encode()?;
    let outcome = self
      .ledger
      .put(key, bytes, Expect::AtVersion(version))
      .await
      .map_err(Error::ledger)?;
    match outcome {
      PutOutcome::Committed(commit) => Ok(commit),
      PutOutcome::Conflict { .. } => Err(Error::Conflict { key: key.to_owned() }),
    }
  }
}

fn check_type(record: &Record, expected: RecordType) -> Result<()> {
  let found = record.record_type();
  if found != expected {
    return Err(Error::TypeMismatch {
      key: record.record_id.clone(),
      expected,
      found,
    });
  }
  Ok(())
}
