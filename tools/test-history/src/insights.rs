//! Classify tracked tests into actionable buckets and summarize run trends.
//!
//! Pure over the store. Lists are built by walking the identity-ordered test
//! map and stable-sorting, so equal keys keep identity order.

use std::cmp::Ordering;

use crate::config::Config;
use crate::store::HistoryStore;
use crate::types::*;

/// Build the full Insights document for a store.
pub fn classify(store: &HistoryStore, config: &Config) -> Insights {
  let qualifying: Vec<(&TestIdentity, &TestStats)> = store
    .tests
    .iter()
    .filter(|(_, s)| s.runs >= config.min_runs_for_insights)
    .collect();

  let flaky_tests = flaky_tests(&qualifying, config);
  let failing_tests = failing_tests(&qualifying, config);
  let slow_tests = slow_tests(&qualifying, config);
  let (improved_tests, degraded_tests) = trending_tests(&qualifying, config);

  let summary = InsightSummary {
    total_tests: store.tests.len(),
    total_runs: store.runs.len(),
    flaky_count: flaky_tests.len(),
    failing_count: failing_tests.len(),
    slow_count: slow_tests.len(),
  };

  Insights {
    flaky_tests,
    failing_tests,
    slow_tests,
    improved_tests,
    degraded_tests,
    trends: trends(&store.runs, config),
    summary,
  }
}

fn flaky_tests(tests: &[(&TestIdentity, &TestStats)], config: &Config) -> Vec<FlakyTest> {
  let mut out: Vec<FlakyTest> = tests
    .iter()
    .filter(|(_, s)| s.flakiness_score > config.flaky_threshold)
    .map(|(id, s)| FlakyTest {
      identity: (*id).clone(),
      flakiness_score: s.flakiness_score,
      runs: s.runs,
      flaky_runs: s.flaky_runs,
      status_changes: s.status_changes,
      recent_statuses: s.recent_statuses.iter().copied().collect(),
      last_error: s.last_error.clone(),
    })
    .collect();
  out.sort_by(|a, b| b.flakiness_score.cmp(&a.flakiness_score));
  out
}

fn failing_tests(tests: &[(&TestIdentity, &TestStats)], config: &Config) -> Vec<FailingTest> {
  let mut out: Vec<FailingTest> = tests
    .iter()
    .filter(|(_, s)| s.success_rate < config.failing_threshold)
    .map(|(id, s)| FailingTest {
      identity: (*id).clone(),
      success_rate: s.success_rate,
      runs: s.runs,
      failed: s.failed,
      last_error: s.last_error.clone(),
    })
    .collect();
  out.sort_by_key(|t| t.success_rate);
  out
}

fn slow_tests(tests: &[(&TestIdentity, &TestStats)], config: &Config) -> Vec<SlowTest> {
  let mut out: Vec<SlowTest> = tests
    .iter()
    .filter(|(_, s)| s.average_duration > config.slow_threshold_ms)
    .map(|(id, s)| SlowTest {
      identity: (*id).clone(),
      average_duration: s.average_duration,
      max_duration: s.max_duration,
      runs: s.runs,
    })
    .collect();
  out.sort_by(|a, b| {
    b.average_duration
      .partial_cmp(&a.average_duration)
      .unwrap_or(Ordering::Equal)
  });
  out
}

/// Split tests whose recent pass rate diverges from their long-run rate.
///
/// The two conditions are strict and opposite, so no test lands in both lists.
fn trending_tests(
  tests: &[(&TestIdentity, &TestStats)],
  config: &Config,
) -> (Vec<TrendingTest>, Vec<TrendingTest>) {
  let mut improved = Vec::new();
  let mut degraded = Vec::new();

  for (id, s) in tests {
    let recent_len = s.recent_statuses.len();
    if recent_len < config.trend_min_recent || recent_len == 0 {
      continue;
    }
    let recent_passed = s
      .recent_statuses
      .iter()
      .filter(|st| **st == TestStatus::Passed)
      .count();
    let recent_rate = recent_passed as f64 / recent_len as f64;
    let overall_rate = s.success_rate as f64 / 100.0;

    let entry = || TrendingTest {
      identity: (*id).clone(),
      recent_pass_rate: (recent_rate * 100.0).round() as u8,
      overall_pass_rate: s.success_rate,
      change: ((recent_rate - overall_rate) * 100.0).round() as i32,
    };

    if recent_rate > overall_rate + config.trend_rate_delta {
      improved.push(entry());
    } else if recent_rate < overall_rate - config.trend_rate_delta {
      degraded.push(entry());
    }
  }

  (improved, degraded)
}

/// Averages and direction over the trailing run window; `None` without runs.
fn trends(runs: &[RunSummary], config: &Config) -> Option<Trends> {
  let start = runs.len().saturating_sub(config.trend_window);
  let window = &runs[start..];
  if window.is_empty() {
    return None;
  }

  let n = window.len() as f64;
  let avg_pass_rate = window.iter().map(|r| r.pass_rate as f64).sum::<f64>() / n;
  let avg_duration = window.iter().map(|r| r.duration as f64).sum::<f64>() / n;
  let avg_test_count = window.iter().map(|r| r.total as f64).sum::<f64>() / n;

  let (earlier, later) = window.split_at(window.len() / 2);
  let (improving, degrading) = match (mean_pass_rate(earlier), mean_pass_rate(later)) {
    (Some(first), Some(second)) => (
      second > first + config.trend_direction_points,
      second < first - config.trend_direction_points,
    ),
    _ => (false, false),
  };

  Some(Trends {
    runs_analyzed: window.len(),
    avg_pass_rate,
    avg_duration,
    avg_test_count,
    improving,
    degrading,
  })
}

fn mean_pass_rate(runs: &[RunSummary]) -> Option<f64> {
  if runs.is_empty() {
    return None;
  }
  Some(runs.iter().map(|r| r.pass_rate as f64).sum::<f64>() / runs.len() as f64)
}
