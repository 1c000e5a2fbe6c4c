//! Demo ledger contents: ten data sources feeding one reranker, which feeds
//! one LLM.

use tracing::info;

use crate::{
  Result,
  ledger::Ledger,
  record::{Attributes, Record},
  store::{BatchReport, RecordStore},
};

pub const DEMO_SOURCES: usize = 10;

/// The demo records, in creation order.
pub fn demo_records() -> Result<Vec<Record>> {
  let mut records = Vec::with_capacity(2 * DEMO_SOURCES + 1);

  for i in 0..DEMO_SOURCES {
    records.push(Record::reliability(format!("default{i}"), "default", "")?);
  }

  for i in 0..DEMO_SOURCES {
    records.push(Record::log(
      format!("default{i}-reranker0"),
      Attributes {
        logger_id: format!("default{i}"),
        output: format!("default_output_from_datasource_default{i}"),
        output_to: "reranker0".into(),
        timestamp: "2025-01-01 00:00:00".into(),
        ..Attributes::default()
      },
    )?);
  }

  records.push(Record::log(
    "reranker0-LLM0",
    Attributes {
      logger_id: "reranker0".into(),
      output: "reranker0_output_from_reranker0".into(),
      output_to: "LLM0".into(),
      timestamp: "2025-01-02 00:00:00".into(),
      ..Attributes::default()
    },
  )?);

  Ok(records)
}

/// Create the demo records. Records that already exist are reported as
/// failures and left untouched.
pub async fn seed_demo_records<L: Ledger>(store: &RecordStore<L>) -> Result<BatchReport> {
  let report = store.create_batch(demo_records()?).await;
  info!(
    created = report.created(),
    total = report.outcomes.len(),
    "seeded demo records"
  );
  Ok(report)
}
