//! Record store and query engine tests against the in-process ledger.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use crate::{
  Attributes, Error, Kind, MemoryLedger, QueryEngine, Record, RecordStore,
  RecordType, Selector,
  ledger::{Entry, Expect, KeyValue, Ledger, Modification, PutOutcome},
  memory::MemoryLedgerError,
  seed,
};

fn split(ledger: MemoryLedger) -> (RecordStore<MemoryLedger>, QueryEngine<MemoryLedger>) {
  let ledger = Arc::new(ledger);
  (RecordStore::new(Arc::clone(&ledger)), QueryEngine::new(ledger))
}

fn setup() -> (RecordStore<MemoryLedger>, QueryEngine<MemoryLedger>) {
  split(MemoryLedger::new())
}

fn step(logger: &str, output_to: &str) -> Attributes {
  Attributes {
    logger_id:  logger.into(),
    input:      "query: who wrote it".into(),
    input_from: "user".into(),
    output:     format!("{logger}-output"),
    output_to:  output_to.into(),
    timestamp:  "2025-03-01 12:00:00".into(),
    reserved:   "".into(),
  }
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_read_roundtrip() {
  let (store, _) = setup();
  store
    .create_log("src1-reranker0", step("src1", "reranker0"))
    .await
    .unwrap();

  let record = store.read("src1-reranker0").await.unwrap();
  assert_eq!(record.record_id, "src1-reranker0");
  assert_eq!(record.kind, Kind::Log);
  assert_eq!(record.attributes, step("src1", "reranker0"));
}

#[tokio::test]
async fn second_create_fails_regardless_of_type() {
  let (store, _) = setup();
  store.create_log("x", step("a", "b")).await.unwrap();

  let again = store.create_log("x", step("c", "d")).await.unwrap_err();
  assert!(matches!(again, Error::AlreadyExists { ref key } if key == "x"));

  let cross = store.create_reliability("x", "digest", "").await.unwrap_err();
  assert!(matches!(cross, Error::AlreadyExists { .. }));

  let feedback = store.create_feedback("x", step("e", "f")).await.unwrap_err();
  assert!(matches!(feedback, Error::AlreadyExists { .. }));

  // The original record is untouched.
  let record = store.read("x").await.unwrap();
  assert_eq!(record.kind, Kind::Log);
  assert_eq!(record.attributes.logger_id, "a");
}

#[tokio::test]
async fn reliability_defaults_on_create() {
  let (store, _) = setup();
  store.create_reliability("default0", "d", "meta").await.unwrap();

  let record = store.read_reliability("default0").await.unwrap();
  assert_eq!(record.score(), Some(100.0));
  assert_eq!(record.attributes.timestamp, "0");
  assert_eq!(record.attributes.input, "d");
  assert_eq!(record.attributes.reserved, "meta");
}

#[tokio::test]
async fn concurrent_creates_have_one_winner() {
  let (store, _) = setup();
  let mut handles = Vec::new();
  for i in 0..16 {
    let store = store.clone();
    handles.push(tokio::spawn(async move {
      store.create_log("shared", step(&format!("writer{i}"), "sink")).await
    }));
  }

  let mut wins = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => wins += 1,
      Err(e) => assert!(matches!(e, Error::AlreadyExists { .. })),
    }
  }
  assert_eq!(wins, 1);
}

// ─── Read ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_missing_is_not_found() {
  let (store, _) = setup();
  let err = store.read("nope").await.unwrap_err();
  assert!(matches!(err, Error::NotFound { ref key } if key == "nope"));
  assert!(!store.exists("nope").await.unwrap());
}

#[tokio::test]
async fn typed_readers_check_type() {
  let (store, _) = setup();
  store.create_feedback("fb1", step("LLM0", "user")).await.unwrap();

  assert!(store.read_feedback("fb1").await.is_ok());
  let err = store.read_reliability("fb1").await.unwrap_err();
  assert!(matches!(
    err,
    Error::TypeMismatch { expected: RecordType::Reliability, found: RecordType::Feedback, .. }
  ));
  assert!(store.read_log("fb1").await.is_err());
}

#[tokio::test]
async fn undecodable_value_is_deserialization_error() {
  let ledger = Arc::new(MemoryLedger::new());
  ledger
    .put("junk", b"{\"logID\": 7}".to_vec(), Expect::Any)
    .await
    .unwrap();
  let store = RecordStore::new(ledger);

  let err = store.read("junk").await.unwrap_err();
  assert!(matches!(err, Error::Deserialization { ref key, .. } if key == "junk"));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_full_overwrites_attributes_and_keeps_type() {
  let (store, _) = setup();
  store.create_feedback("fb1", step("LLM0", "user")).await.unwrap();

  let corrected = step("LLM1", "reviewer");
  let stored = store.update_full("fb1", corrected.clone()).await.unwrap();
  assert_eq!(stored.kind, Kind::Feedback);

  let record = store.read("fb1").await.unwrap();
  assert_eq!(record.kind, Kind::Feedback);
  assert_eq!(record.attributes, corrected);
}

#[tokio::test]
async fn update_full_keeps_reliability_score() {
  let (store, _) = setup();
  store.create_reliability("s", "d", "").await.unwrap();
  store.update_score("s", 7.0, false).await.unwrap();
  store.update_full("s", step("s", "")).await.unwrap();
  assert_eq!(store.read("s").await.unwrap().score(), Some(7.0));
}

#[tokio::test]
async fn update_missing_is_not_found() {
  let (store, _) = setup();
  let err = store.update_full("ghost", step("a", "b")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  let err = store.update_score("ghost", 1.0, true).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn delta_updates_accumulate_in_any_order() {
  let (store, _) = setup();
  store.create_reliability("a", "d", "").await.unwrap();
  store.create_reliability("b", "d", "").await.unwrap();

  store.update_score("a", 4.0, true).await.unwrap();
  store.update_score("a", -1.5, true).await.unwrap();
  store.update_score("b", -1.5, true).await.unwrap();
  store.update_score("b", 4.0, true).await.unwrap();

  let a = store.read_reliability("a").await.unwrap().score();
  let b = store.read_reliability("b").await.unwrap().score();
  assert_eq!(a, Some(102.5));
  assert_eq!(a, b);
}

#[tokio::test]
async fn absolute_update_discards_prior_value() {
  let (store, _) = setup();
  store.create_reliability("a", "d", "").await.unwrap();
  store.update_score("a", 33.0, true).await.unwrap();
  store.update_score("a", 0.25, false).await.unwrap();
  assert_eq!(store.read("a").await.unwrap().score(), Some(0.25));
}

#[tokio::test]
async fn score_update_on_log_record_is_rejected() {
  let (store, _) = setup();
  store.create_log("l", step("a", "b")).await.unwrap();
  let err = store.update_score("l", 1.0, true).await.unwrap_err();
  assert!(matches!(err, Error::TypeMismatch { found: RecordType::Log, .. }));
  // Nothing was written.
  assert_eq!(store.ledger().history_of("l").await.unwrap().len(), 1);
}

#[tokio::test]
async fn overflowing_delta_is_rejected_and_record_stays_readable() {
  let (store, queries) = setup();
  store.create_reliability("s", "d", "").await.unwrap();

  store.update_score("s", f64::MAX, true).await.unwrap();
  let err = store.update_score("s", f64::MAX, true).await.unwrap_err();
  assert!(matches!(err, Error::InvalidRecord(_)));

  let record = store.read_reliability("s").await.unwrap();
  assert_eq!(record.score(), Some(100.0 + f64::MAX));
  assert_eq!(queries.history_of("s").await.unwrap().len(), 2);
  store.update_score("s", 1.0, false).await.unwrap();
}

#[tokio::test]
async fn non_finite_absolute_score_is_rejected() {
  let (store, _) = setup();
  store.create_reliability("s", "d", "").await.unwrap();

  for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
    let err = store.update_score("s", bad, false).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRecord(_)));
  }
  assert_eq!(store.read("s").await.unwrap().score(), Some(100.0));
  assert_eq!(store.ledger().history_of("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_refuses_record_labelled_with_another_key() {
  let ledger = Arc::new(MemoryLedger::new());
  let stray = Record::log("other", step("a", "b")).unwrap();
  ledger.put("k", stray.encode().unwrap(), Expect::Absent).await.unwrap();
  let store = RecordStore::new(ledger);

  let err = store.update_full("k", step("c", "d")).await.unwrap_err();
  assert!(matches!(err, Error::InvalidRecord(_)));
  assert!(!store.exists("other").await.unwrap());
  assert_eq!(store.ledger().history_of("k").await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_delta_updates_lose_nothing() {
  let (store, _) = setup();
  store.create_reliability("hot", "d", "").await.unwrap();

  let mut handles = Vec::new();
  for _ in 0..20 {
    let store = store.clone();
    handles.push(tokio::spawn(async move {
      // Conflicts are reported, not retried by the store; retry here.
      loop {
        match store.update_score("hot", 0.5, true).await {
          Ok(_) => break,
          Err(Error::Conflict { .. }) => tokio::task::yield_now().await,
          Err(e) => panic!("unexpected error: {e}"),
        }
      }
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  assert_eq!(store.read("hot").await.unwrap().score(), Some(110.0));
}

// ─── Racing writer ───────────────────────────────────────────────────────────

/// Commits a foreign write to the key just before the first `put` it sees,
/// as a concurrent transaction would.
struct RacingLedger {
  inner: MemoryLedger,
  raced: AtomicBool,
}

impl Ledger for RacingLedger {
  type Error = MemoryLedgerError;

  async fn get(&self, key: &str) -> Result<Option<Entry>, Self::Error> {
    self.inner.get(key).await
  }

  async fn put(
    &self,
    key: &str,
    value: Vec<u8>,
    expect: Expect,
  ) -> Result<PutOutcome, Self::Error> {
    if !self.raced.swap(true, Ordering::SeqCst) {
      self.inner.put(key, value.clone(), Expect::Any).await?;
    }
    self.inner.put(key, value, expect).await
  }

  async fn range_scan(&self, start: &str, end: &str) -> Result<Vec<KeyValue>, Self::Error> {
    self.inner.range_scan(start, end).await
  }

  fn supports_rich_query(&self) -> bool { self.inner.supports_rich_query() }

  async fn query(&self, selector: &Selector) -> Result<Vec<KeyValue>, Self::Error> {
    self.inner.query(selector).await
  }

  async fn history_of(&self, key: &str) -> Result<Vec<Modification>, Self::Error> {
    self.inner.history_of(key).await
  }
}

fn racing(inner: MemoryLedger) -> RecordStore<RacingLedger> {
  RecordStore::new(Arc::new(RacingLedger { inner, raced: AtomicBool::new(false) }))
}

#[tokio::test]
async fn create_losing_race_reports_already_exists() {
  let store = racing(MemoryLedger::new());
  let err = store.create_reliability("s", "d", "").await.unwrap_err();
  assert!(matches!(err, Error::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_losing_race_reports_conflict() {
  let inner = MemoryLedger::new();
  let seed = Record::reliability("s", "d", "").unwrap();
  inner.put("s", seed.encode().unwrap(), Expect::Absent).await.unwrap();

  let store = racing(inner);
  let err = store.update_score("s", 5.0, true).await.unwrap_err();
  assert!(matches!(err, Error::Conflict { ref key } if key == "s"));
}

// ─── Batch ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_is_not_atomic() {
  let (store, queries) = setup();
  store.create_reliability("taken", "d", "").await.unwrap();

  let batch = vec![
    Record::reliability("first", "d", "").unwrap(),
    Record::reliability("taken", "d", "").unwrap(),
    Record::reliability("last", "d", "").unwrap(),
  ];
  let report = store.create_batch(batch).await;

  assert_eq!(report.outcomes.len(), 3);
  assert_eq!(report.created(), 2);
  assert!(!report.all_created());
  let failed: Vec<_> = report.failures().map(|o| o.record_id.as_str()).collect();
  assert_eq!(failed, ["taken"]);

  let all = queries.query_by_type(RecordType::Reliability).await.unwrap();
  assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn reliability_batch_reports_invalid_sources_per_item() {
  let (store, _) = setup();
  let sources = [("s0", "d"), ("", "d"), ("s2", "d")]
    .map(|(id, digest)| (id.to_owned(), digest.to_owned(), String::new()));
  let report = store.create_reliability_batch(sources).await;

  let results: Vec<_> = report
    .outcomes
    .iter()
    .map(|o| (o.record_id.as_str(), o.result.is_ok()))
    .collect();
  assert_eq!(results, [("s0", true), ("", false), ("s2", true)]);
  assert!(matches!(report.outcomes[1].result, Err(Error::InvalidRecord(_))));
  assert_eq!(store.read("s2").await.unwrap().score(), Some(100.0));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_by_type_returns_only_that_type() {
  let (store, queries) = setup();
  store.create_log("l1", step("a", "b")).await.unwrap();
  store.create_reliability("r1", "d", "").await.unwrap();
  store.create_feedback("f1", step("c", "d")).await.unwrap();
  store.create_reliability("r2", "d", "").await.unwrap();
  store.create_log("l2", step("e", "f")).await.unwrap();

  let mut ids: Vec<_> = queries
    .query_by_type(RecordType::Reliability)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.record_id)
    .collect();
  ids.sort();
  assert_eq!(ids, ["r1", "r2"]);

  assert_eq!(queries.query_by_type(RecordType::Log).await.unwrap().len(), 2);
  assert_eq!(queries.query_by_type(RecordType::Feedback).await.unwrap().len(), 1);
}

#[tokio::test]
async fn query_json_with_legacy_field_names() {
  let (store, queries) = setup();
  store.create_reliability("default0", "d", "").await.unwrap();
  store.create_log("default0-reranker0", step("default0", "reranker0")).await.unwrap();

  let found = queries
    .query_json(r#"{"selector": {"LogID": "default0", "Type": "reliability"}}"#)
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].record_id, "default0");

  let by_id = queries
    .query_by_type_and_id(RecordType::Log, "default0-reranker0")
    .await
    .unwrap();
  assert_eq!(by_id.len(), 1);
}

#[tokio::test]
async fn query_by_score_range() {
  let (store, queries) = setup();
  for (id, score) in [("a", 10.0), ("b", 50.0), ("c", 90.0)] {
    store.create_reliability(id, "d", "").await.unwrap();
    store.update_score(id, score, false).await.unwrap();
  }
  let found = queries
    .query_json(r#"{"reliabilityScore": {"$gte": 50}}"#)
    .await
    .unwrap();
  assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn score_query_ignores_log_and_feedback_records() {
  let (store, queries) = setup();
  store.create_reliability("r", "d", "").await.unwrap();
  store.update_score("r", 20.0, false).await.unwrap();
  store.create_log("l", step("a", "b")).await.unwrap();
  store.create_feedback("f", step("c", "d")).await.unwrap();

  let low = queries
    .query_json(r#"{"reliabilityScore": {"$lt": 99.5}}"#)
    .await
    .unwrap();
  let ids: Vec<_> = low.iter().map(|r| r.record_id.as_str()).collect();
  assert_eq!(ids, ["r"]);
}

#[tokio::test]
async fn invalid_selector_is_rejected_before_the_ledger() {
  let (_, queries) = split(MemoryLedger::without_rich_query());
  let err = queries.query_json(r#"{"nosuchfield": 1}"#).await.unwrap_err();
  assert!(matches!(err, Error::InvalidSelector(_)));
}

#[tokio::test]
async fn ledger_without_index_rejects_queries_but_scans() {
  let (store, queries) = split(MemoryLedger::without_rich_query());
  store.create_log("b", step("a", "b")).await.unwrap();
  store.create_reliability("a", "d", "").await.unwrap();

  let err = queries.query_by_type(RecordType::Log).await.unwrap_err();
  assert!(matches!(err, Error::QueryUnsupported));

  let all = queries.range_all().await.unwrap();
  let ids: Vec<_> = all.iter().map(|r| r.record_id.as_str()).collect();
  assert_eq!(ids, ["a", "b"]);
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reliability_score_history_scenario() {
  let (store, queries) = setup();
  store.create_reliability("default0", "d", "").await.unwrap();
  store.update_score("default0", 5.0, true).await.unwrap();
  assert_eq!(store.read("default0").await.unwrap().score(), Some(105.0));
  store.update_score("default0", 50.0, false).await.unwrap();
  assert_eq!(store.read("default0").await.unwrap().score(), Some(50.0));

  let history = queries.history_of("default0").await.unwrap();
  let scores: Vec<_> = history
    .iter()
    .map(|e| e.record.as_ref().and_then(Record::score))
    .collect();
  assert_eq!(scores, [Some(100.0), Some(105.0), Some(50.0)]);
  assert!(history.iter().all(|e| !e.is_delete));

  let mut tx_ids: Vec<_> = history.iter().map(|e| e.tx_id.clone()).collect();
  tx_ids.dedup();
  assert_eq!(tx_ids.len(), 3);
}

#[tokio::test]
async fn history_has_one_entry_per_write_ending_at_current() {
  let (store, queries) = setup();
  store.create_log("l", step("v0", "x")).await.unwrap();
  for i in 1..=4 {
    store.update_full("l", step(&format!("v{i}"), "x")).await.unwrap();
  }

  let history = queries.history_of("l").await.unwrap();
  assert_eq!(history.len(), 5);
  let loggers: Vec<_> = history
    .iter()
    .map(|e| e.record.as_ref().unwrap().attributes.logger_id.clone())
    .collect();
  assert_eq!(loggers, ["v0", "v1", "v2", "v3", "v4"]);
  assert_eq!(
    history.last().unwrap().record.as_ref().unwrap(),
    &store.read("l").await.unwrap()
  );
}

#[tokio::test]
async fn history_includes_tombstones() {
  let ledger = Arc::new(MemoryLedger::new());
  let store = RecordStore::new(Arc::clone(&ledger));
  let queries = QueryEngine::new(Arc::clone(&ledger));

  store.create_log("gone", step("a", "b")).await.unwrap();
  ledger.delete("gone").unwrap();
  assert!(!store.exists("gone").await.unwrap());
  // A deleted key can be created again.
  store.create_feedback("gone", step("c", "d")).await.unwrap();

  let history = queries.history_of("gone").await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history[0].record.as_ref().unwrap().kind, Kind::Log);
  assert!(history[1].is_tombstone() && history[1].is_delete);
  assert_eq!(history[1].record_id, "gone");
  assert_eq!(history[2].record.as_ref().unwrap().kind, Kind::Feedback);
}

#[tokio::test]
async fn history_of_unknown_key_is_empty() {
  let (_, queries) = setup();
  assert!(queries.history_of("never").await.unwrap().is_empty());
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_creates_demo_pipeline_once() {
  let (store, queries) = setup();

  let report = seed::seed_demo_records(&store).await.unwrap();
  assert_eq!(report.created(), 21);

  assert_eq!(queries.query_by_type(RecordType::Reliability).await.unwrap().len(), 10);
  assert_eq!(queries.query_by_type(RecordType::Log).await.unwrap().len(), 11);

  let hop = store.read_log("reranker0-LLM0").await.unwrap();
  assert_eq!(hop.attributes.output_to, "LLM0");
  assert_eq!(hop.attributes.timestamp, "2025-01-02 00:00:00");

  let again = seed::seed_demo_records(&store).await.unwrap();
  assert_eq!(again.created(), 0);
  assert_eq!(again.failures().count(), 21);
}
