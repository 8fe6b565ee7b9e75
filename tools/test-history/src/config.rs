//! Engine configuration with sane defaults.

use std::path::Path;

use serde::Deserialize;

use crate::error::HistoryError;

/// Tunable thresholds for history retention and classification.
///
/// Scorer weights are not part of this struct; see [`crate::score`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Max run summaries kept in the rolling window (oldest evicted first).
  pub max_runs: usize,
  /// Length of each test's `recentStatuses` sequence.
  pub recent_window: usize,
  /// Age (days since first seen) after which low-evidence tests are pruned.
  pub prune_after_days: i64,
  /// Tests with at least this many runs are never pruned by age alone.
  pub prune_min_runs: u32,
  /// Tests with fewer runs than this are left out of every insight list.
  pub min_runs_for_insights: u32,
  /// Flakiness score a test must exceed to be listed as flaky.
  pub flaky_threshold: u8,
  /// Success rate (percent) below which a test is listed as failing.
  pub failing_threshold: u8,
  /// Average duration (ms) above which a test is listed as slow.
  pub slow_threshold_ms: f64,
  /// Minimum `recentStatuses` length before improved/degraded is considered.
  pub trend_min_recent: usize,
  /// Recent-vs-overall pass rate delta (fraction) for improved/degraded.
  pub trend_rate_delta: f64,
  /// Number of trailing runs the trend summary looks at.
  pub trend_window: usize,
  /// Pass-rate points the later half must move by to flag a direction.
  pub trend_direction_points: f64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      max_runs: 50,
      recent_window: 10,
      prune_after_days: 30,
      prune_min_runs: 5,
      min_runs_for_insights: 3,
      flaky_threshold: 20,
      failing_threshold: 50,
      slow_threshold_ms: 5000.0,
      trend_min_recent: 5,
      trend_rate_delta: 0.2,
      trend_window: 10,
      trend_direction_points: 5.0,
    }
  }
}

impl Config {
  /// Parse a TOML document; keys that are absent keep their defaults.
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }

  /// Load a TOML config file.
  pub fn load(path: &Path) -> Result<Self, HistoryError> {
    let raw = std::fs::read_to_string(path)
      .map_err(|e| HistoryError::config(path, format!("read: {}", e)))?;
    Self::from_toml_str(&raw).map_err(|e| HistoryError::config(path, e.to_string()))
  }
}
