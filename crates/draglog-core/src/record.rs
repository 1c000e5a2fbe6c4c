//! Record types: the unit of provenance stored in the ledger.
//!
//! A record is one of three kinds sharing a common attribute set. Log and
//! feedback records describe a single transformation step ("what did stage X
//! consume, and what did it hand to whom"); reliability records hold the
//! running trust score of a data source.
//!
//! On the wire every record is the same flat JSON object. The field names are
//! the canonical keys used both for storage and for selector matching.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Score assigned to a freshly created reliability record.
pub const DEFAULT_RELIABILITY_SCORE: f64 = 100.0;

/// Wire value of `reliabilityScore` for records that carry no score.
pub const NO_SCORE: f64 = -1.0;

/// Timestamp written into a freshly created reliability record.
pub const RELIABILITY_GENESIS_TIMESTAMP: &str = "0";

// ─── RecordType ──────────────────────────────────────────────────────────────

/// The discriminator stored in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
  Log,
  Reliability,
  Feedback,
}

impl RecordType {
  pub const ALL: [RecordType; 3] =
    [RecordType::Log, RecordType::Reliability, RecordType::Feedback];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Log => "log",
      Self::Reliability => "reliability",
      Self::Feedback => "feedback",
    }
  }
}

impl fmt::Display for RecordType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RecordType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "log" => Ok(Self::Log),
      "reliability" => Ok(Self::Reliability),
      "feedback" => Ok(Self::Feedback),
      other => Err(Error::InvalidRecord(format!("unknown record type {other:?}"))),
    }
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// The attribute set shared by every kind of record.
///
/// `timestamp` is caller-supplied logical time and is never interpreted.
/// `reserved` is an opaque extension payload (for example a serialised list
/// of per-source score contributions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
  pub logger_id:  String,
  pub input:      String,
  pub input_from: String,
  pub output:     String,
  pub output_to:  String,
  pub timestamp:  String,
  pub reserved:   String,
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Per-kind data. Only reliability records carry a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kind {
  Log,
  Feedback,
  Reliability { score: f64 },
}

impl Kind {
  pub fn record_type(&self) -> RecordType {
    match self {
      Self::Log => RecordType::Log,
      Self::Feedback => RecordType::Feedback,
      Self::Reliability { .. } => RecordType::Reliability,
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A single ledger entry. `record_id` is the ledger key: a composite step ID
/// such as `"{source}-{stage}"` for log and feedback records, the data-source
/// ID for reliability records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRecord", into = "WireRecord")]
pub struct Record {
  pub record_id:  String,
  pub attributes: Attributes,
  pub kind:       Kind,
}

impl Record {
  /// Build a log record for one pipeline step.
  pub fn log(record_id: impl Into<String>, attributes: Attributes) -> Result<Self> {
    Self::build(record_id.into(), attributes, Kind::Log)
  }

  /// Build a feedback record; same shape as a log record.
  pub fn feedback(
    record_id: impl Into<String>,
    attributes: Attributes,
  ) -> Result<Self> {
    Self::build(record_id.into(), attributes, Kind::Feedback)
  }

  /// Build the initial reliability record for a data source. The digest is
  /// kept in `input` and the data-source ID doubles as the logger ID.
  pub fn reliability(
    data_source_id: impl Into<String>,
    digest: impl Into<String>,
    reserved: impl Into<String>,
  ) -> Result<Self> {
    let data_source_id = data_source_id.into();
    let attributes = Attributes {
      logger_id: data_source_id.clone(),
      input: digest.into(),
      timestamp: RELIABILITY_GENESIS_TIMESTAMP.to_owned(),
      reserved: reserved.into(),
      ..Attributes::default()
    };
    Self::build(
      data_source_id,
      attributes,
      Kind::Reliability { score: DEFAULT_RELIABILITY_SCORE },
    )
  }

  fn build(record_id: String, attributes: Attributes, kind: Kind) -> Result<Self> {
    if record_id.is_empty() {
      return Err(Error::InvalidRecord(format!(
        "{} record must have a non-empty ID",
        kind.record_type()
      )));
    }
    Ok(Self { record_id, attributes, kind })
  }

  pub fn record_type(&self) -> RecordType { self.kind.record_type() }

  /// The reliability score, or `None` for log and feedback records.
  pub fn score(&self) -> Option<f64> {
    match self.kind {
      Kind::Reliability { score } => Some(score),
      _ => None,
    }
  }

  /// Encode as the flat JSON stored under the record's key.
  pub fn encode(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }

  /// Decode the bytes stored under `key`.
  pub fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
    serde_json::from_slice(bytes).map_err(|source| Error::Deserialization {
      key: key.to_owned(),
      source,
    })
  }
}

// ─── Wire form ───────────────────────────────────────────────────────────────

/// The flat JSON object persisted in the ledger.
#[derive(Serialize, Deserialize)]
struct WireRecord {
  #[serde(rename = "logID")]
  log_id:            String,
  #[serde(rename = "loggerID", default)]
  logger_id:         String,
  #[serde(rename = "type")]
  record_type:       RecordType,
  #[serde(default)]
  input:             String,
  #[serde(rename = "inputFrom", default)]
  input_from:        String,
  #[serde(default)]
  output:            String,
  #[serde(rename = "outputTo", default)]
  output_to:         String,
  #[serde(rename = "reliabilityScore", default)]
  reliability_score: f64,
  #[serde(default)]
  timestamp:         String,
  #[serde(default)]
  reserved:          String,
}

impl From<Record> for WireRecord {
  fn from(r: Record) -> Self {
    let reliability_score = r.score().unwrap_or(NO_SCORE);
    let record_type = r.record_type();
    let a = r.attributes;
    Self {
      log_id: r.record_id,
      logger_id: a.logger_id,
      record_type,
      input: a.input,
      input_from: a.input_from,
      output: a.output,
      output_to: a.output_to,
      reliability_score,
      timestamp: a.timestamp,
      reserved: a.reserved,
    }
  }
}

impl From<WireRecord> for Record {
  fn from(w: WireRecord) -> Self {
    let kind = match w.record_type {
      RecordType::Log => Kind::Log,
      RecordType::Feedback => Kind::Feedback,
      RecordType::Reliability => Kind::Reliability { score: w.reliability_score },
    };
    Self {
      record_id: w.log_id,
      attributes: Attributes {
        logger_id:  w.logger_id,
        input:      w.input,
        input_from: w.input_from,
        output:     w.output,
        output_to:  w.output_to,
        timestamp:  w.timestamp,
        reserved:   w.reserved,
      },
      kind,
    }
  }
}
