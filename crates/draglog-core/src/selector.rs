//! Structured selectors over the record schema.
//!
//! A [`Selector`] is a conjunction of [`Clause`]s, each comparing one record
//! field against a value. Its JSON form mirrors Mango (`{"selector": {...}}`)
//! so callers can hand in the same documents a rich-query ledger accepts, but
//! unlike a raw passthrough every field name, operator and value type is
//! checked against the schema when the selector is built.

use std::{cmp::Ordering, fmt};

use serde_json::{Map, Value};

use crate::{Error, Result, record::RecordType};

// ─── Field ───────────────────────────────────────────────────────────────────

/// A selectable record field. The wire names are the keys of the stored
/// JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
  LogId,
  LoggerId,
  Type,
  Input,
  InputFrom,
  Output,
  OutputTo,
  ReliabilityScore,
  Timestamp,
  Reserved,
}

impl Field {
  pub const ALL: [Field; 10] = [
    Field::LogId,
    Field::LoggerId,
    Field::Type,
    Field::Input,
    Field::InputFrom,
    Field::Output,
    Field::OutputTo,
    Field::ReliabilityScore,
    Field::Timestamp,
    Field::Reserved,
  ];

  pub fn wire_name(self) -> &'static str {
    match self {
      Self::LogId => "logID",
      Self::LoggerId => "loggerID",
      Self::Type => "type",
      Self::Input => "input",
      Self::InputFrom => "inputFrom",
      Self::Output => "output",
      Self::OutputTo => "outputTo",
      Self::ReliabilityScore => "reliabilityScore",
      Self::Timestamp => "timestamp",
      Self::Reserved => "reserved",
    }
  }

  /// Resolve a field name case-insensitively. `recordID` and `dataSourceID`
  /// are accepted as aliases of `logID`.
  pub fn parse(name: &str) -> Option<Self> {
    let lowered = name.to_ascii_lowercase();
    match lowered.as_str() {
      "recordid" | "datasourceid" => Some(Self::LogId),
      _ => Self::ALL
        .into_iter()
        .find(|f| f.wire_name().eq_ignore_ascii_case(&lowered)),
    }
  }

  fn check_operand(self, value: &Value) -> Result<()> {
    match self {
      Self::ReliabilityScore if !value.is_number() => Err(Error::InvalidSelector(
        format!("{} expects a number, got {value}", self.wire_name()),
      )),
      Self::Type => match value.as_str() {
        Some(s) => s.parse::<RecordType>().map(|_| ()).map_err(|_| {
          Error::InvalidSelector(format!("unknown record type {s:?}"))
        }),
        None => Err(Error::InvalidSelector(format!(
          "type expects a string, got {value}"
        ))),
      },
      Self::ReliabilityScore => Ok(()),
      _ if !value.is_string() => Err(Error::InvalidSelector(format!(
        "{} expects a string, got {value}",
        self.wire_name()
      ))),
      _ => Ok(()),
    }
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.wire_name())
  }
}

// ─── Operator ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  Eq,
  Ne,
  Gt,
  Gte,
  Lt,
  Lte,
  In,
}

impl Operator {
  pub fn mango_name(self) -> &'static str {
    match self {
      Self::Eq => "$eq",
      Self::Ne => "$ne",
      Self::Gt => "$gt",
      Self::Gte => "$gte",
      Self::Lt => "$lt",
      Self::Lte => "$lte",
      Self::In => "$in",
    }
  }

  pub fn parse(name: &str) -> Option<Self> {
    match name {
      "$eq" => Some(Self::Eq),
      "$ne" => Some(Self::Ne),
      "$gt" => Some(Self::Gt),
      "$gte" => Some(Self::Gte),
      "$lt" => Some(Self::Lt),
      "$lte" => Some(Self::Lte),
      "$in" => Some(Self::In),
      _ => None,
    }
  }
}

// ─── Clause ──────────────────────────────────────────────────────────────────

/// One validated comparison. For [`Operator::In`] the value is an array of
/// operands; for every other operator it is a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
  pub field: Field,
  pub op:    Operator,
  pub value: Value,
}

impl Clause {
  pub fn new(field: Field, op: Operator, value: Value) -> Result<Self> {
    if op == Operator::In {
      let items = value.as_array().ok_or_else(|| {
        Error::InvalidSelector(format!("$in on {field} expects an array"))
      })?;
      for item in items {
        field.check_operand(item)?;
      }
    } else {
      field.check_operand(&value)?;
    }
    Ok(Self { field, op, value })
  }

  /// Evaluate against a stored record document. A document lacking the field
  /// never matches, and a score clause only matches reliability records.
  pub fn matches(&self, doc: &Value) -> bool {
    if self.field == Field::ReliabilityScore
      && doc.get(Field::Type.wire_name()).and_then(Value::as_str)
        != Some(RecordType::Reliability.as_str())
    {
      return false;
    }
    let Some(actual) = doc.get(self.field.wire_name()) else {
      return false;
    };
    let ord = |expected: &Value| compare(actual, expected);
    match self.op {
      Operator::Eq => ord(&self.value) == Some(Ordering::Equal),
      Operator::Ne => ord(&self.value) != Some(Ordering::Equal),
      Operator::Gt => ord(&self.value) == Some(Ordering::Greater),
      Operator::Gte => {
        matches!(ord(&self.value), Some(Ordering::Greater | Ordering::Equal))
      }
      Operator::Lt => ord(&self.value) == Some(Ordering::Less),
      Operator::Lte => {
        matches!(ord(&self.value), Some(Ordering::Less | Ordering::Equal))
      }
      Operator::In => self
        .value
        .as_array()
        .is_some_and(|items| items.iter().any(|v| ord(v) == Some(Ordering::Equal))),
    }
  }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
  match (actual, expected) {
    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
    (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    _ => None,
  }
}

// ─── Selector ────────────────────────────────────────────────────────────────

/// A conjunction of clauses. The empty selector matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
  clauses: Vec<Clause>,
}

impl Selector {
  pub fn new() -> Self { Self::default() }

  /// All records of one type.
  pub fn by_type(record_type: RecordType) -> Self {
    Self {
      clauses: vec![Clause {
        field: Field::Type,
        op:    Operator::Eq,
        value: Value::String(record_type.as_str().to_owned()),
      }],
    }
  }

  /// Add a clause, validating it against the schema.
  pub fn and(
    mut self,
    field: Field,
    op: Operator,
    value: impl Into<Value>,
  ) -> Result<Self> {
    self.clauses.push(Clause::new(field, op, value.into())?);
    Ok(self)
  }

  pub fn clauses(&self) -> &[Clause] { &self.clauses }

  pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

  pub fn matches(&self, doc: &Value) -> bool {
    self.clauses.iter().all(|c| c.matches(doc))
  }

  /// Parse a selector document.
  pub fn parse(json: &str) -> Result<Self> {
    let value: Value = serde_json::from_str(json)
      .map_err(|e| Error::InvalidSelector(format!("malformed JSON: {e}")))?;
    Self::from_json(&value)
  }

  /// Build from either `{"selector": {...}}` or a bare field map.
  pub fn from_json(value: &Value) -> Result<Self> {
    let outer = value
      .as_object()
      .ok_or_else(|| Error::InvalidSelector("expected a JSON object".into()))?;

    let body = match outer.get("selector") {
      Some(inner) => {
        if let Some(extra) = outer.keys().find(|k| k.as_str() != "selector") {
          return Err(Error::InvalidSelector(format!(
            "unsupported query option {extra:?}"
          )));
        }
        inner.as_object().ok_or_else(|| {
          Error::InvalidSelector("\"selector\" must be an object".into())
        })?
      }
      None => outer,
    };

    let mut clauses = Vec::new();
    for (name, condition) in body {
      let field = Field::parse(name)
        .ok_or_else(|| Error::InvalidSelector(format!("unknown field {name:?}")))?;
      match condition {
        Value::Object(ops) => {
          if ops.is_empty() {
            return Err(Error::InvalidSelector(format!(
              "empty condition on {field}"
            )));
          }
          for (op_name, operand) in ops {
            let op = Operator::parse(op_name).ok_or_else(|| {
              Error::InvalidSelector(format!("unsupported operator {op_name:?}"))
            })?;
            clauses.push(Clause::new(field, op, operand.clone())?);
          }
        }
        scalar => clauses.push(Clause::new(field, Operator::Eq, scalar.clone())?),
      }
    }

    Ok(Self { clauses })
  }

  /// Render the canonical Mango document.
  pub fn to_json(&self) -> Value {
    let mut fields = Map::new();
    for clause in &self.clauses {
      let slot = fields
        .entry(clause.field.wire_name())
        .or_insert_with(|| Value::Object(Map::new()));
      if let Value::Object(ops) = slot {
        ops.insert(clause.op.mango_name().to_owned(), clause.value.clone());
      }
    }
    serde_json::json!({ "selector": fields })
  }
}

impl fmt::Display for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_json())
  }
}
