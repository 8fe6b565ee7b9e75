//! Integration tests for the history engine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use test_history::types::{IngestedRun, RunSummary, TestOutcome};
use test_history::{Config, Engine, HistoryStore, RunContext, TestIdentity, TestStats, TestStatus};

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

fn ctx_at(ts: DateTime<Utc>) -> RunContext {
  RunContext::new(Some("abc123".into()), Some("feature/login".into()), ts)
}

/// A runner report with one spec per (title, attempt statuses) pair.
fn report(tests: &[(&str, &[&str])]) -> String {
  let specs: Vec<serde_json::Value> = tests
    .iter()
    .map(|(title, attempts)| {
      let results: Vec<serde_json::Value> = attempts
        .iter()
        .map(|s| serde_json::json!({ "status": s, "duration": 120, "error": { "message": "assertion failed" } }))
        .collect();
      serde_json::json!({ "title": title, "tests": [{ "results": results }] })
    })
    .collect();
  serde_json::json!({
    "stats": { "duration": 5000 },
    "suites": [{
      "file": "tests/e2e/app.spec.ts",
      "title": "app.spec.ts",
      "suites": [{ "title": "App", "specs": specs }]
    }]
  })
  .to_string()
}

fn id(title: &str) -> TestIdentity {
  TestIdentity(format!("app.spec.ts > App > {}", title))
}

#[test]
fn first_run_scenario() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let json = report(&[("A", &["passed"]), ("B", &["failed"])]);

  let (insights, changed) = engine.process(&mut store, Some(json.as_str()), &ctx_at(t0()));
  assert!(changed);

  let a = &store.tests[&id("A")];
  assert_eq!(a.runs, 1);
  assert_eq!(a.success_rate, 100);
  let b = &store.tests[&id("B")];
  assert_eq!(b.runs, 1);
  assert_eq!(b.success_rate, 0);
  assert_eq!(b.last_error.as_deref(), Some("assertion failed"));

  assert!(insights.flaky_tests.is_empty());
  assert!(insights.failing_tests.is_empty());
  assert!(insights.slow_tests.is_empty());
  assert!(insights.improved_tests.is_empty());
  assert!(insights.degraded_tests.is_empty());
  assert_eq!(insights.summary.total_tests, 2);
  assert_eq!(insights.summary.total_runs, 1);

  let run = &store.runs[0];
  assert_eq!(run.commit, "abc123");
  assert_eq!(run.branch, "feature/login");
  assert_eq!(run.duration, 5000);
  assert_eq!(run.pass_rate, 50);
}

#[test]
fn flaky_emerges_scenario() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let statuses = ["passed", "failed", "passed", "failed", "passed"];
  let mut insights = None;
  for (i, s) in statuses.iter().enumerate() {
    let json = report(&[("C", &[*s]), ("steady", &["passed"])]);
    let ts = t0() + Duration::hours(i as i64);
    insights = Some(engine.process(&mut store, Some(json.as_str()), &ctx_at(ts)).0);
  }
  let insights = insights.unwrap();

  let c = &store.tests[&id("C")];
  assert_eq!(c.status_changes, 4);
  assert_eq!(c.flaky_runs, 0);
  assert_eq!(c.flakiness_score, 60);

  assert_eq!(insights.flaky_tests.len(), 1);
  assert_eq!(insights.flaky_tests[0].identity, id("C"));
  assert_eq!(store.tests[&id("steady")].flakiness_score, 0);
}

#[test]
fn retried_flaky_runs_raise_score() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  for i in 0..4 {
    let json = report(&[("retry", &["failed", "passed"])]);
    engine.process(&mut store, Some(json.as_str()), &ctx_at(t0() + Duration::hours(i)));
  }
  let stats = &store.tests[&id("retry")];
  assert_eq!(stats.runs, 4);
  assert_eq!(stats.flaky_runs, 4);
  assert_eq!(stats.last_status, Some(TestStatus::Passed));
  // change 0, flaky 4/4 -> 40, recent 0.
  assert_eq!(stats.flakiness_score, 40);
}

#[test]
fn run_window_holds_most_recent_fifty() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let json = report(&[("A", &["passed"])]);
  for i in 0..60 {
    engine.process(&mut store, Some(json.as_str()), &ctx_at(t0() + Duration::minutes(i)));
  }
  assert_eq!(store.runs.len(), 50);
  let expected: Vec<_> = (10..60).map(|i| t0() + Duration::minutes(i)).collect();
  let actual: Vec<_> = store.runs.iter().map(|r| r.timestamp).collect();
  assert_eq!(actual, expected);
  assert_eq!(store.tests[&id("A")].recent_statuses.len(), 10);
}

#[test]
fn pruning_scenario() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let old = t0() - Duration::days(45);

  let mut sparse = TestStats::new(old);
  sparse.runs = 2;
  let mut established = TestStats::new(old);
  established.runs = 10;
  store.tests.insert(TestIdentity("old > sparse".into()), sparse);
  store.tests.insert(TestIdentity("old > established".into()), established);

  let json = report(&[("A", &["passed"])]);
  engine.process(&mut store, Some(json.as_str()), &ctx_at(t0()));

  assert!(!store.tests.contains_key(&TestIdentity("old > sparse".into())));
  assert!(store.tests.contains_key(&TestIdentity("old > established".into())));
}

#[test]
fn missing_or_malformed_results_are_a_no_op() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  engine.process(&mut store, Some(report(&[("A", &["passed"])]).as_str()), &ctx_at(t0()));
  let before = store.clone();

  for input in [
    None,
    Some("{"),
    Some(r#"{ "suites": [{ "file": "a.spec.ts", "specs": [{ "title": "x", "tests": [{}] }] }] }"#),
    Some(r#"{ "suites": [] }"#),
  ] {
    let (insights, changed) = engine.process(&mut store, input, &ctx_at(t0() + Duration::hours(1)));
    assert!(!changed);
    assert_eq!(insights.summary.total_runs, 1);
  }
  assert_eq!(store, before);
}

#[test]
fn persisted_store_classifies_identically() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let patterns: [&[&str]; 6] = [
    &["passed"],
    &["failed", "passed"],
    &["failed"],
    &["passed"],
    &["failed", "failed"],
    &["passed"],
  ];
  for (i, p) in patterns.iter().enumerate() {
    let json = report(&[("wobbly", *p), ("solid", &["passed"]), ("broken", &["failed"])]);
    engine.process(&mut store, Some(json.as_str()), &ctx_at(t0() + Duration::hours(i as i64)));
  }

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("history.json");
  store.save(&path).unwrap();
  let reloaded = HistoryStore::load(&path);

  assert_eq!(reloaded, store);
  assert_eq!(engine.classify(&reloaded), engine.classify(&store));
  assert_eq!(
    serde_json::to_string(&engine.classify(&reloaded)).unwrap(),
    serde_json::to_string(&engine.classify(&store)).unwrap()
  );
}

#[test]
fn corrupt_history_is_replaced_by_fresh_store() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("history.json");
  std::fs::write(&path, "not json at all").unwrap();

  let engine = Engine::with_defaults();
  let mut store = HistoryStore::load(&path);
  assert!(store.runs.is_empty());

  engine.process(&mut store, Some(report(&[("A", &["passed"])]).as_str()), &ctx_at(t0()));
  store.save(&path).unwrap();

  let reloaded = HistoryStore::load_strict(&path).unwrap().unwrap();
  assert_eq!(reloaded.runs.len(), 1);
  assert_eq!(reloaded.version, "1.0");
}

#[test]
fn improved_and_degraded_never_overlap() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  // "recovering": 10 failures then 10 passes; "decaying": the reverse.
  for i in 0..20 {
    let (r, d) = if i < 10 { ("failed", "passed") } else { ("passed", "failed") };
    let json = report(&[("recovering", &[r]), ("decaying", &[d])]);
    engine.process(&mut store, Some(json.as_str()), &ctx_at(t0() + Duration::hours(i)));
  }
  let insights = engine.classify(&store);

  let improved: Vec<_> = insights.improved_tests.iter().map(|t| t.identity.clone()).collect();
  let degraded: Vec<_> = insights.degraded_tests.iter().map(|t| t.identity.clone()).collect();
  assert_eq!(improved, vec![id("recovering")]);
  assert_eq!(degraded, vec![id("decaying")]);
  assert!(improved.iter().all(|i| !degraded.contains(i)));

  assert_eq!(insights.improved_tests[0].change, 50);
  assert_eq!(insights.degraded_tests[0].change, -50);
}

#[test]
fn min_evidence_filter_ignores_raw_stats() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  let mut s = TestStats::new(t0());
  s.runs = 2;
  s.failed = 2;
  s.flakiness_score = 100;
  s.average_duration = 120_000.0;
  store.tests.insert(TestIdentity("x".into()), s);

  let insights = engine.classify(&store);
  assert!(insights.flaky_tests.is_empty());
  assert!(insights.failing_tests.is_empty());
  assert!(insights.slow_tests.is_empty());
}

#[test]
fn score_monotonicity_fixture() {
  let engine = Engine::with_defaults();
  let mut unstable = TestStats::new(t0());
  let mut stable = TestStats::new(t0());
  let mut store = HistoryStore::default();

  // Built through the updater so every derived field is consistent.
  for i in 0..10 {
    let flip = if i % 2 == 0 { TestStatus::Passed } else { TestStatus::Failed };
    let flaky = TestOutcome {
      status: flip,
      duration_ms: 10,
      retry_count: 1,
      was_flaky: true,
      error: None,
    };
    let steady = TestOutcome {
      status: TestStatus::Passed,
      duration_ms: 10,
      retry_count: 0,
      was_flaky: false,
      error: None,
    };
    test_history::update::record_outcome(&mut unstable, &flaky, engine.config());
    test_history::update::record_outcome(&mut stable, &steady, engine.config());
  }
  assert_eq!(unstable.status_changes, 9);
  assert_eq!(unstable.flaky_runs, 10);
  assert_eq!(unstable.flakiness_score, 100);
  assert_eq!(stable.flakiness_score, 0);

  store.tests.insert(TestIdentity("unstable".into()), unstable);
  store.tests.insert(TestIdentity("stable".into()), stable);
  let insights = engine.classify(&store);
  assert_eq!(insights.flaky_tests.len(), 1);
  assert_eq!(insights.flaky_tests[0].identity.as_str(), "unstable");
}

#[test]
fn direct_update_api() {
  let config = Config {
    max_runs: 2,
    ..Config::default()
  };
  let engine = Engine::new(config);
  let mut store = HistoryStore::default();

  for i in 0..3 {
    let ctx = ctx_at(t0() + Duration::days(i));
    let mut outcomes = std::collections::BTreeMap::new();
    outcomes.insert(
      TestIdentity("direct".into()),
      TestOutcome {
        status: TestStatus::Skipped,
        duration_ms: 0,
        retry_count: 0,
        was_flaky: false,
        error: None,
      },
    );
    let run = IngestedRun {
      summary: RunSummary::new(&ctx, 0, 0, 0, 1),
      outcomes,
    };
    engine.update(&mut store, &run);
  }

  assert_eq!(store.runs.len(), 2);
  let stats = &store.tests[&TestIdentity("direct".into())];
  assert_eq!(stats.skipped, 3);
  assert_eq!(stats.success_rate, 0);
  assert_eq!(stats.min_duration, 0);
}

#[test]
fn insights_json_contract() {
  let engine = Engine::with_defaults();
  let mut store = HistoryStore::default();
  for i in 0..3 {
    let json = report(&[("B", &["failed"])]);
    engine.process(&mut store, Some(json.as_str()), &ctx_at(t0() + Duration::hours(i)));
  }
  let value = serde_json::to_value(engine.classify(&store)).unwrap();

  for key in [
    "flakyTests",
    "failingTests",
    "slowTests",
    "improvedTests",
    "degradedTests",
    "trends",
    "summary",
  ] {
    assert!(value.get(key).is_some(), "missing {}", key);
  }
  let failing = &value["failingTests"][0];
  assert_eq!(failing["identity"], "app.spec.ts > App > B");
  assert_eq!(failing["successRate"], 0);
  assert_eq!(failing["lastError"], "assertion failed");
  assert_eq!(value["summary"]["failingCount"], 1);
  assert_eq!(value["trends"]["runsAnalyzed"], 3);
}
