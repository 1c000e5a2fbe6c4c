//! [`SqliteLedger`]: the SQLite implementation of [`Ledger`].

use std::path::Path;

use draglog_core::{
  Commit, CommitTimestamp, Entry, Expect, KeyValue, Ledger, Modification,
  PutOutcome, Selector,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{
    RawModification, RawPair, decode_version, encode_value, encode_version,
    selector_sql, tx_id,
  },
  schema::SCHEMA,
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// A draglog ledger backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteLedger {
  conn:       tokio_rusqlite::Connection,
  rich_query: bool,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let ledger = Self { conn, rich_query: true };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  /// Open an in-memory ledger: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let ledger = Self { conn, rich_query: true };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  /// Enable or disable [`Ledger::query`]. Scans and history are unaffected.
  pub fn with_rich_query(mut self, enabled: bool) -> Self {
    self.rich_query = enabled;
    self
  }

  /// Flush and close the underlying connection.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Delete `key`, recording a tombstone in its history. Returns `None` if
  /// the key was not live.
  pub async fn delete(&self, key: &str) -> Result<Option<Commit>> {
    let key = key.to_owned();
    let commit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version: Option<i64> = tx
          .query_row(
            "SELECT version FROM world_state WHERE key = ?1 AND value IS NOT NULL",
            rusqlite::params![key],
            |r| r.get(0),
          )
          .optional()?;
        let Some(version) = version else {
          return Ok(None);
        };

        let version = decode_version(version) + 1;
        let timestamp = CommitTimestamp::now();
        let tx_id = tx_id(&key, version, timestamp);
        tx.execute(
          "UPDATE world_state SET value = NULL, version = ?2 WHERE key = ?1",
          rusqlite::params![key, encode_version(version)],
        )?;
        tx.execute(
          "INSERT INTO history (key, value, tx_id, seconds, nanos, is_delete)
           VALUES (?1, NULL, ?2, ?3, ?4, 1)",
          rusqlite::params![key, tx_id, timestamp.seconds, timestamp.nanos],
        )?;
        tx.commit()?;
        Ok(Some(Commit { tx_id, timestamp, version }))
      })
      .await?;
    Ok(commit)
  }

  async fn select_pairs(
    &self,
    where_sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<KeyValue>> {
    let raws: Vec<RawPair> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT key, value FROM world_state
           WHERE value IS NOT NULL AND ({where_sql})
           ORDER BY key"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(RawPair { key: row.get(0)?, value: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws.into_iter().map(RawPair::into_key_value).collect())
  }
}

// ─── Ledger impl ─────────────────────────────────────────────────────────────

impl Ledger for SqliteLedger {
  type Error = Error;

  async fn get(&self, key: &str) -> Result<Option<Entry>> {
    let key = key.to_owned();
    let row: Option<(String, i64)> = self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            "SELECT value, version FROM world_state
             WHERE key = ?1 AND value IS NOT NULL",
            rusqlite::params![key],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        Ok(row)
      })
      .await?;

    Ok(row.map(|(value, version)| Entry {
      value:   value.into_bytes(),
      version: decode_version(version),
    }))
  }

  async fn put(&self, key: &str, value: Vec<u8>, expect: Expect) -> Result<PutOutcome> {
    let value = encode_value(key, value)?;
    let key = key.to_owned();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row: Option<(bool, i64)> = tx
          .query_row(
            "SELECT value IS NOT NULL, version FROM world_state WHERE key = ?1",
            rusqlite::params![key],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let current = row
          .filter(|(live, _)| *live)
          .map(|(_, version)| decode_version(version));
        if !expect.admits(current) {
          // Dropping the transaction rolls it back.
          return Ok(PutOutcome::Conflict { current });
        }

        let version = row.map_or(0, |(_, v)| decode_version(v)) + 1;
        let timestamp = CommitTimestamp::now();
        let tx_id = tx_id(&key, version, timestamp);
        tx.execute(
          "INSERT INTO world_state (key, value, version) VALUES (?1, ?2, ?3)
           ON CONFLICT (key) DO UPDATE
             SET value = excluded.value, version = excluded.version",
          rusqlite::params![key, value, encode_version(version)],
        )?;
        tx.execute(
          "INSERT INTO history (key, value, tx_id, seconds, nanos, is_delete)
           VALUES (?1, ?2, ?3, ?4, ?5, 0)",
          rusqlite::params![key, value, tx_id, timestamp.seconds, timestamp.nanos],
        )?;
        tx.commit()?;
        Ok(PutOutcome::Committed(Commit { tx_id, timestamp, version }))
      })
      .await?;

    if let PutOutcome::Conflict { current } = &outcome {
      debug!(?expect, ?current, "conditional put rejected");
    }
    Ok(outcome)
  }

  async fn range_scan(&self, start: &str, end: &str) -> Result<Vec<KeyValue>> {
    self
      .select_pairs("key >= ?1 AND (?2 = '' OR key < ?2)".to_owned(), vec![
        start.to_owned().into(),
        end.to_owned().into(),
      ])
      .await
  }

  fn supports_rich_query(&self) -> bool { self.rich_query }

  async fn query(&self, selector: &Selector) -> Result<Vec<KeyValue>> {
    if !self.rich_query {
      return Err(Error::RichQueryDisabled);
    }
    let (where_sql, params) = selector_sql(selector);
    debug!(%where_sql, "rich query");
    self.select_pairs(where_sql, params).await
  }

  async fn history_of(&self, key: &str) -> Result<Vec<Modification>> {
    let key = key.to_owned();
    let raws: Vec<RawModification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT value, tx_id, seconds, nanos, is_delete
           FROM history WHERE key = ?1 ORDER BY seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key], |row| {
            Ok(RawModification {
              value:     row.get(0)?,
              tx_id:     row.get(1)?,
              seconds:   row.get(2)?,
              nanos:     row.get(3)?,
              is_delete: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws.into_iter().map(RawModification::into_modification).collect())
  }
}
