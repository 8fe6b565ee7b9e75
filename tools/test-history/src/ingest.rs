//! Turn one runner result tree into a run summary plus per-test outcomes.

use std::collections::BTreeMap;

use crate::error::HistoryError;
use crate::identity;
use crate::types::*;

/// Parse a runner report. Shape mismatches (missing `suites`, `tests` or
/// `results`) are reported as malformed input.
pub fn parse(json: &str) -> Result<RawReport, HistoryError> {
  if json.trim().is_empty() {
    return Err(HistoryError::malformed("empty document"));
  }
  serde_json::from_str(json).map_err(|e| HistoryError::malformed(e.to_string()))
}

/// Flatten a parsed report into one outcome per test identity.
///
/// Returns `None` when the report holds no test with at least one attempt,
/// so an empty run never reaches the history.
pub fn ingest(report: &RawReport, ctx: &RunContext) -> Option<IngestedRun> {
  let mut acc = Accumulator::default();

  for file_suite in &report.suites {
    let file = file_suite
      .file
      .as_deref()
      .unwrap_or(file_suite.title.as_str());
    let mut describe = Vec::new();
    collect_specs(file_suite, file, &describe, &mut acc);
    for nested in &file_suite.suites {
      walk(nested, file, &mut describe, &mut acc);
    }
  }

  if acc.outcomes.is_empty() {
    return None;
  }

  let duration = report
    .stats
    .as_ref()
    .and_then(|s| s.duration)
    .map(|d| to_ms(Some(d)))
    .unwrap_or(acc.duration_sum);

  Some(IngestedRun {
    summary: RunSummary::new(ctx, duration, acc.passed, acc.failed, acc.skipped),
    outcomes: acc.outcomes,
  })
}

/// Parse and ingest, turning every "no data" condition into `None`.
///
/// The caller skips the history update entirely on `None`.
pub fn ingest_or_skip(json: Option<&str>, ctx: &RunContext) -> Option<IngestedRun> {
  let Some(json) = json else {
    tracing::info!("no test results available; history left untouched");
    return None;
  };
  let report = match parse(json) {
    Ok(r) => r,
    Err(e) => {
      tracing::warn!(error = %e, "ignoring test results; history left untouched");
      return None;
    }
  };
  let run = ingest(&report, ctx);
  match &run {
    Some(run) => tracing::info!(
      tests = run.outcomes.len(),
      passed = run.summary.passed,
      failed = run.summary.failed,
      skipped = run.summary.skipped,
      "ingested test run"
    ),
    None => tracing::info!("test results contain no executed tests; history left untouched"),
  }
  run
}

/// Build the outcome for one test from its attempts (last attempt is authoritative).
pub fn outcome_from_attempts(attempts: &[RawAttempt]) -> Option<TestOutcome> {
  let last = attempts.last()?;
  let status = TestStatus::from_str_loose(&last.status);
  let retry_count = (attempts.len() - 1) as u32;

  let statuses: Vec<TestStatus> = attempts
    .iter()
    .map(|a| TestStatus::from_str_loose(&a.status))
    .collect();
  let was_flaky = retry_count > 0
    && statuses.contains(&TestStatus::Passed)
    && statuses.contains(&TestStatus::Failed);

  let error = match status {
    TestStatus::Failed => last.error.as_ref().map(error_text),
    _ => None,
  };

  Some(TestOutcome {
    status,
    duration_ms: to_ms(last.duration),
    retry_count,
    was_flaky,
    error,
  })
}

#[derive(Default)]
struct Accumulator {
  outcomes: BTreeMap<TestIdentity, TestOutcome>,
  passed: u32,
  failed: u32,
  skipped: u32,
  duration_sum: u64,
}

fn walk(suite: &RawSuite, file: &str, describe: &mut Vec<String>, acc: &mut Accumulator) {
  describe.push(suite.title.clone());
  collect_specs(suite, file, describe, acc);
  for nested in &suite.suites {
    walk(nested, file, describe, acc);
  }
  describe.pop();
}

fn collect_specs(suite: &RawSuite, file: &str, describe: &[String], acc: &mut Accumulator) {
  let path: Vec<&str> = describe.iter().map(String::as_str).collect();
  for spec in &suite.specs {
    let id = identity::compose(file, &path, &spec.title);
    for test in &spec.tests {
      let Some(outcome) = outcome_from_attempts(&test.results) else {
        tracing::debug!(test = %id, "test has no attempts; skipped");
        continue;
      };
      match outcome.status {
        TestStatus::Passed => acc.passed += 1,
        TestStatus::Failed => acc.failed += 1,
        TestStatus::Skipped => acc.skipped += 1,
      }
      acc.duration_sum += outcome.duration_ms;
      // Same identity twice in one run (e.g. several projects): last one wins.
      acc.outcomes.insert(id.clone(), outcome);
    }
  }
}

/// Milliseconds, rounded; missing, negative or non-finite values become 0.
fn to_ms(d: Option<f64>) -> u64 {
  match d {
    Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
    _ => 0,
  }
}

fn error_text(v: &serde_json::Value) -> String {
  match v {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Object(map) => match map.get("message") {
      Some(serde_json::Value::String(s)) => s.clone(),
      _ => v.to_string(),
    },
    other => other.to_string(),
  }
}
