//! Flakiness score 0–100 from a test's accumulated statistics.
//!
//! Three signals are blended so that one bad run cannot push a test high:
//! long-run status oscillation, retry-detected flakiness, and volatility in
//! the recent status window.

use crate::types::{TestStats, TestStatus};

pub const CHANGE_RATE_WEIGHT: f64 = 40.0;
pub const FLAKY_RATE_WEIGHT: f64 = 40.0;
pub const RECENT_INCONSISTENCY_WEIGHT: f64 = 20.0;

/// Score a test. Returns 0 until the test has at least two runs.
pub fn flakiness_score(stats: &TestStats) -> u8 {
  if stats.runs <= 1 {
    return 0;
  }
  let runs = stats.runs as f64;

  let change_rate = (stats.status_changes as f64 / (runs - 1.0)).min(1.0);
  let flaky_rate = (stats.flaky_runs as f64 / runs).min(1.0);

  let recent: Vec<TestStatus> = stats.recent_statuses.iter().copied().collect();
  let recent_inconsistency =
    adjacent_differences(&recent) as f64 / (recent.len().saturating_sub(1)).max(1) as f64;

  let score = change_rate * CHANGE_RATE_WEIGHT
    + flaky_rate * FLAKY_RATE_WEIGHT
    + recent_inconsistency * RECENT_INCONSISTENCY_WEIGHT;
  score.round().clamp(0.0, 100.0) as u8
}

/// Count positions where a status differs from the one before it.
pub fn adjacent_differences(statuses: &[TestStatus]) -> usize {
  statuses.windows(2).filter(|w| w[0] != w[1]).count()
}
