//! Fold one ingested run into the history store.

use chrono::Duration;

use crate::config::Config;
use crate::score;
use crate::store::HistoryStore;
use crate::types::{IngestedRun, TestOutcome, TestStats, TestStatus};

/// What an update did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
  pub created: usize,
  pub updated: usize,
  pub pruned: usize,
  pub evicted_runs: usize,
}

/// Append the run summary, update every test it touched, then prune stale entries.
///
/// Performs no I/O; the caller persists the store afterwards.
pub fn update(store: &mut HistoryStore, run: &IngestedRun, config: &Config) -> UpdateReport {
  let mut report = UpdateReport::default();

  store.runs.push(run.summary.clone());
  if store.runs.len() > config.max_runs {
    let excess = store.runs.len() - config.max_runs;
    store.runs.drain(..excess);
    report.evicted_runs = excess;
  }

  let now = run.summary.timestamp;
  for (id, outcome) in &run.outcomes {
    let stats = store.tests.entry(id.clone()).or_insert_with(|| {
      report.created += 1;
      TestStats::new(now)
    });
    record_outcome(stats, outcome, config);
    report.updated += 1;
  }

  // No cutoff (nothing ages out) when the configured age does not fit a timestamp.
  let cutoff = Duration::try_days(config.prune_after_days).and_then(|age| now.checked_sub_signed(age));
  let before = store.tests.len();
  store.tests.retain(|id, stats| {
    run.outcomes.contains_key(id)
      || stats.runs >= config.prune_min_runs
      || cutoff.map_or(true, |c| stats.first_seen_timestamp >= c)
  });
  report.pruned = before - store.tests.len();

  tracing::info!(
    created = report.created,
    updated = report.updated,
    pruned = report.pruned,
    evicted_runs = report.evicted_runs,
    runs = store.runs.len(),
    tests = store.tests.len(),
    "history updated"
  );
  report
}

/// Fold one outcome into a test's statistics and recompute derived fields.
pub fn record_outcome(stats: &mut TestStats, outcome: &TestOutcome, config: &Config) {
  stats.runs += 1;
  match outcome.status {
    TestStatus::Passed => stats.passed += 1,
    TestStatus::Failed => {
      stats.failed += 1;
      if let Some(err) = &outcome.error {
        stats.last_error = Some(err.clone());
      }
    }
    TestStatus::Skipped => stats.skipped += 1,
  }

  stats.total_duration += outcome.duration_ms;
  stats.average_duration = stats.total_duration as f64 / stats.runs as f64;
  stats.min_duration = stats.min_duration.min(outcome.duration_ms);
  stats.max_duration = stats.max_duration.max(outcome.duration_ms);

  if outcome.was_flaky {
    stats.flaky_runs += 1;
  }

  // Compare before overwriting last_status.
  if stats.last_status.is_some_and(|last| last != outcome.status) {
    stats.status_changes += 1;
  }
  stats.last_status = Some(outcome.status);

  stats.recent_statuses.push_back(outcome.status);
  while stats.recent_statuses.len() > config.recent_window {
    stats.recent_statuses.pop_front();
  }

  stats.flakiness_score = score::flakiness_score(stats);
  stats.success_rate = crate::types::percent(stats.passed, stats.runs);
}
