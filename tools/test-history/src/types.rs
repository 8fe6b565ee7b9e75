//! Core types for the history engine (runner input, persisted store, Insights output).

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unknown JSON fields carried through a load/save cycle untouched.
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract — what the test runner writes)
// ---------------------------------------------------------------------------

/// Top-level runner report. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReport {
  #[serde(default)]
  pub stats: Option<RawStats>,
  pub suites: Vec<RawSuite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStats {
  #[serde(default)]
  pub duration: Option<f64>,
}

/// A file suite (top level) or a describe block (nested).
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuite {
  #[serde(default)]
  pub file: Option<String>,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub suites: Vec<RawSuite>,
  #[serde(default)]
  pub specs: Vec<RawSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpec {
  pub title: String,
  pub tests: Vec<RawTest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTest {
  /// One entry per attempt, in execution order.
  pub results: Vec<RawAttempt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttempt {
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub duration: Option<f64>,
  /// Either a plain string or an object with a `message` field.
  #[serde(default)]
  pub error: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

pub const DEFAULT_COMMIT: &str = "local";
pub const DEFAULT_BRANCH: &str = "unknown";

/// Where and when a run happened. Opaque to the scoring logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
  pub commit: String,
  pub branch: String,
  pub timestamp: DateTime<Utc>,
}

impl RunContext {
  /// Build a context, substituting sentinels for missing or blank identifiers.
  pub fn new(commit: Option<String>, branch: Option<String>, timestamp: DateTime<Utc>) -> Self {
    fn or_sentinel(v: Option<String>, sentinel: &str) -> String {
      v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| sentinel.to_string())
    }
    Self {
      commit: or_sentinel(commit, DEFAULT_COMMIT),
      branch: or_sentinel(branch, DEFAULT_BRANCH),
      timestamp,
    }
  }
}

// ---------------------------------------------------------------------------
// Test identity + status
// ---------------------------------------------------------------------------

/// Stable key for one logical test across runs and branches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestIdentity(pub String);

impl TestIdentity {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TestIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
  Passed,
  Failed,
  Skipped,
}

impl TestStatus {
  /// Normalize a runner status string. Unknown values count as skipped.
  pub fn from_str_loose(s: &str) -> Self {
    match s.to_ascii_lowercase().as_str() {
      "passed" | "expected" => Self::Passed,
      "failed" | "unexpected" => Self::Failed,
      _ => Self::Skipped,
    }
  }
}

// ---------------------------------------------------------------------------
// Ingested run (ephemeral)
// ---------------------------------------------------------------------------

/// Outcome of one test in one run, taken from its final attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
  pub status: TestStatus,
  pub duration_ms: u64,
  pub retry_count: u32,
  /// Retried, and the attempts include both a pass and a failure.
  pub was_flaky: bool,
  /// Present only when `status` is failed.
  pub error: Option<String>,
}

/// A run ready to fold into the history store.
#[derive(Debug, Clone)]
pub struct IngestedRun {
  pub summary: RunSummary,
  pub outcomes: BTreeMap<TestIdentity, TestOutcome>,
}

// ---------------------------------------------------------------------------
// Persisted types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub commit: String,
  #[serde(default)]
  pub branch: String,
  /// Milliseconds.
  #[serde(default)]
  pub duration: u64,
  #[serde(default)]
  pub total: u32,
  #[serde(default)]
  pub passed: u32,
  #[serde(default)]
  pub failed: u32,
  #[serde(default)]
  pub skipped: u32,
  /// passed / total * 100, rounded; 0 for an empty run.
  #[serde(default)]
  pub pass_rate: u8,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

impl RunSummary {
  pub fn new(
    ctx: &RunContext,
    duration: u64,
    passed: u32,
    failed: u32,
    skipped: u32,
  ) -> Self {
    let total = passed + failed + skipped;
    Self {
      timestamp: ctx.timestamp,
      commit: ctx.commit.clone(),
      branch: ctx.branch.clone(),
      duration,
      total,
      passed,
      failed,
      skipped,
      pass_rate: percent(passed, total),
      extra: ExtraFields::new(),
    }
  }
}

/// Accumulated statistics for one test identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStats {
  pub first_seen_timestamp: DateTime<Utc>,
  #[serde(default)]
  pub runs: u32,
  #[serde(default)]
  pub passed: u32,
  #[serde(default)]
  pub failed: u32,
  #[serde(default)]
  pub skipped: u32,
  #[serde(default)]
  pub total_duration: u64,
  #[serde(default)]
  pub average_duration: f64,
  #[serde(default = "unset_min_duration")]
  pub min_duration: u64,
  #[serde(default)]
  pub max_duration: u64,
  #[serde(default)]
  pub flaky_runs: u32,
  #[serde(default)]
  pub last_status: Option<TestStatus>,
  #[serde(default)]
  pub status_changes: u32,
  /// Oldest first.
  #[serde(default)]
  pub recent_statuses: VecDeque<TestStatus>,
  #[serde(default)]
  pub flakiness_score: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
  #[serde(default)]
  pub success_rate: u8,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

fn unset_min_duration() -> u64 {
  u64::MAX
}

impl TestStats {
  pub fn new(first_seen: DateTime<Utc>) -> Self {
    Self {
      first_seen_timestamp: first_seen,
      runs: 0,
      passed: 0,
      failed: 0,
      skipped: 0,
      total_duration: 0,
      average_duration: 0.0,
      min_duration: unset_min_duration(),
      max_duration: 0,
      flaky_runs: 0,
      last_status: None,
      status_changes: 0,
      recent_statuses: VecDeque::new(),
      flakiness_score: 0,
      last_error: None,
      success_rate: 0,
      extra: ExtraFields::new(),
    }
  }
}

/// Integer percentage of `part` in `whole`, rounded; 0 when `whole` is 0.
pub fn percent(part: u32, whole: u32) -> u8 {
  if whole == 0 {
    return 0;
  }
  ((part as f64 / whole as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what the report renderers read)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyTest {
  pub identity: TestIdentity,
  pub flakiness_score: u8,
  pub runs: u32,
  pub flaky_runs: u32,
  pub status_changes: u32,
  pub recent_statuses: Vec<TestStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailingTest {
  pub identity: TestIdentity,
  pub success_rate: u8,
  pub runs: u32,
  pub failed: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowTest {
  pub identity: TestIdentity,
  pub average_duration: f64,
  pub max_duration: u64,
  pub runs: u32,
}

/// A test whose recent pass rate moved away from its long-run rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingTest {
  pub identity: TestIdentity,
  /// Percent.
  pub recent_pass_rate: u8,
  /// Percent.
  pub overall_pass_rate: u8,
  /// Recent minus overall, in percentage points.
  pub change: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
  pub runs_analyzed: usize,
  pub avg_pass_rate: f64,
  pub avg_duration: f64,
  pub avg_test_count: f64,
  pub improving: bool,
  pub degrading: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightSummary {
  pub total_tests: usize,
  pub total_runs: usize,
  pub flaky_count: usize,
  pub failing_count: usize,
  pub slow_count: usize,
}

/// Everything the report renderers get from the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
  pub flaky_tests: Vec<FlakyTest>,
  pub failing_tests: Vec<FailingTest>,
  pub slow_tests: Vec<SlowTest>,
  pub improved_tests: Vec<TrendingTest>,
  pub degraded_tests: Vec<TrendingTest>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub trends: Option<Trends>,
  pub summary: InsightSummary,
}
