//! Conversions between ledger types and the representations stored in
//! SQLite columns, plus the selector-to-SQL translation used by rich
//! queries.
//!
//! Values are stored as TEXT so SQLite's JSON functions can read them.
//! Commit timestamps are split into integer seconds and nanoseconds.

use draglog_core::{
  CommitTimestamp, KeyValue, Modification, RecordType,
  selector::{Clause, Field, Operator, Selector},
};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(key: &str, value: Vec<u8>) -> Result<String> {
  String::from_utf8(value).map_err(|_| Error::NonUtf8Value { key: key.to_owned() })
}

pub fn encode_version(version: u64) -> i64 { version as i64 }

pub fn decode_version(version: i64) -> u64 { version as u64 }

// ─── Transaction ids ─────────────────────────────────────────────────────────

/// A 64-hex-digit transaction id, unique per commit.
pub fn tx_id(key: &str, version: u64, timestamp: CommitTimestamp) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hasher.update([0]);
  hasher.update(version.to_be_bytes());
  hasher.update(timestamp.seconds.to_be_bytes());
  hasher.update(timestamp.nanos.to_be_bytes());
  hasher.update(Uuid::new_v4().as_bytes());
  hex::encode(hasher.finalize())
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

pub struct RawPair {
  pub key:   String,
  pub value: String,
}

impl RawPair {
  pub fn into_key_value(self) -> KeyValue {
    KeyValue { key: self.key, value: self.value.into_bytes() }
  }
}

pub struct RawModification {
  pub value:     Option<String>,
  pub tx_id:     String,
  pub seconds:   i64,
  pub nanos:     u32,
  pub is_delete: bool,
}

impl RawModification {
  pub fn into_modification(self) -> Modification {
    Modification {
      value:     self.value.map(String::into_bytes),
      timestamp: CommitTimestamp { seconds: self.seconds, nanos: self.nanos },
      tx_id:     self.tx_id,
      is_delete: self.is_delete,
    }
  }
}

// ─── Selectors ───────────────────────────────────────────────────────────────

/// Translate a validated selector into a `WHERE` fragment over the `value`
/// column and its positional parameters. Field paths come from the fixed
/// schema, never from caller input, so only operands are bound.
pub fn selector_sql(selector: &Selector) -> (String, Vec<SqlValue>) {
  let mut params = Vec::new();
  let predicates: Vec<String> = selector
    .clauses()
    .iter()
    .map(|clause| clause_sql(clause, &mut params))
    .collect();

  let sql = if predicates.is_empty() {
    "1".to_owned()
  } else {
    predicates.join(" AND ")
  };
  (sql, params)
}

/// Score clauses are restricted to reliability records, whose score is real;
/// other types only carry the `-1` wire placeholder.
fn clause_sql(clause: &Clause, params: &mut Vec<SqlValue>) -> String {
  let predicate = predicate_sql(clause, params);
  if clause.field != Field::ReliabilityScore {
    return predicate;
  }
  format!(
    "(json_extract(value, '$.{}') = '{}' AND {predicate})",
    Field::Type.wire_name(),
    RecordType::Reliability.as_str(),
  )
}

fn predicate_sql(clause: &Clause, params: &mut Vec<SqlValue>) -> String {
  let path = format!("json_extract(value, '$.{}')", clause.field.wire_name());

  let op = match clause.op {
    Operator::Eq => "=",
    Operator::Ne => "!=",
    Operator::Gt => ">",
    Operator::Gte => ">=",
    Operator::Lt => "<",
    Operator::Lte => "<=",
    Operator::In => {
      let items = clause.value.as_array().map(Vec::as_slice).unwrap_or_default();
      if items.is_empty() {
        return "0".to_owned();
      }
      let slots: Vec<String> = items
        .iter()
        .map(|item| {
          params.push(sql_value(item));
          format!("?{}", params.len())
        })
        .collect();
      return format!("{path} IN ({})", slots.join(", "));
    }
  };

  params.push(sql_value(&clause.value));
  format!("{path} {op} ?{}", params.len())
}

fn sql_value(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    other => SqlValue::Text(other.to_string()),
  }
}
