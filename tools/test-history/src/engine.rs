//! Core engine: binds a config to the ingest → update → classify pipeline.

use crate::config::Config;
use crate::error::HistoryError;
use crate::ingest;
use crate::insights;
use crate::store::HistoryStore;
use crate::types::*;
use crate::update::{self, UpdateReport};

/// The history engine. Stateless apart from its config; the store is passed in.
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Parse and ingest a runner report.
  ///
  /// `Ok(None)` means the report was well formed but held no executed tests.
  pub fn ingest(&self, json: &str, ctx: &RunContext) -> Result<Option<IngestedRun>, HistoryError> {
    let report = ingest::parse(json)?;
    Ok(ingest::ingest(&report, ctx))
  }

  pub fn update(&self, store: &mut HistoryStore, run: &IngestedRun) -> UpdateReport {
    update::update(store, run, &self.config)
  }

  pub fn classify(&self, store: &HistoryStore) -> Insights {
    insights::classify(store, &self.config)
  }

  /// Fold a report into the store (when there is usable data) and classify.
  ///
  /// Missing or malformed input leaves the store untouched; the returned
  /// flag says whether the store changed and needs persisting.
  pub fn process(
    &self,
    store: &mut HistoryStore,
    json: Option<&str>,
    ctx: &RunContext,
  ) -> (Insights, bool) {
    let changed = match ingest::ingest_or_skip(json, ctx) {
      Some(run) => {
        self.update(store, &run);
        true
      }
      None => false,
    };
    (self.classify(store), changed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone, Utc};

  fn report(status: &str) -> String {
    format!(
      r#"{{ "suites": [{{ "file": "cart.spec.ts", "suites": [{{ "title": "Cart", "specs": [
        {{ "title": "adds item", "tests": [{{ "results": [{{ "status": "{}", "duration": 50 }}] }}] }}
      ]}}]}}]}}"#,
      status
    )
  }

  fn ctx(i: i64) -> RunContext {
    RunContext::new(
      Some(format!("sha{}", i)),
      Some("main".into()),
      Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(i),
    )
  }

  #[test]
  fn process_updates_and_classifies() {
    let engine = Engine::with_defaults();
    let mut store = HistoryStore::default();
    let statuses = ["passed", "failed", "passed", "failed", "passed"];
    for (i, s) in statuses.iter().enumerate() {
      let (_, changed) = engine.process(&mut store, Some(report(s).as_str()), &ctx(i as i64));
      assert!(changed);
    }
    let (insights, _) = engine.process(&mut store, None, &ctx(9));
    assert_eq!(store.runs.len(), 5);
    assert_eq!(insights.flaky_tests.len(), 1);
    assert_eq!(insights.flaky_tests[0].identity.as_str(), "cart.spec.ts > Cart > adds item");
    assert_eq!(insights.flaky_tests[0].flakiness_score, 60);
  }

  #[test]
  fn malformed_input_leaves_store_untouched() {
    let engine = Engine::with_defaults();
    let mut store = HistoryStore::default();
    engine.process(&mut store, Some(report("passed").as_str()), &ctx(0));
    let before = store.clone();

    let (_, changed) = engine.process(&mut store, Some(r#"{ "suites": [{ "specs": [{}] }] }"#), &ctx(1));
    assert!(!changed);
    assert_eq!(store, before);
  }

  #[test]
  fn ingest_surfaces_malformed_error() {
    let engine = Engine::with_defaults();
    let err = engine.ingest("[]", &ctx(0)).unwrap_err();
    assert!(matches!(err, HistoryError::MalformedInput { .. }));
  }
}
