//! Structured error types for the history engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
  /// The raw result tree does not have the runner's suites/specs/tests/results shape.
  #[error("malformed input: {reason}")]
  MalformedInput { reason: String },

  /// A history file exists but could not be read back as a store.
  #[error("history store {path} is corrupt: {reason}")]
  StoreCorruption { path: PathBuf, reason: String },

  #[error("failed to persist history store to {path}: {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("config {path}: {reason}")]
  Config { path: PathBuf, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl HistoryError {
  pub fn malformed(reason: impl Into<String>) -> Self {
    Self::MalformedInput {
      reason: reason.into(),
    }
  }

  pub fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::StoreCorruption {
      path: path.into(),
      reason: reason.into(),
    }
  }

  pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::Config {
      path: path.into(),
      reason: reason.into(),
    }
  }
}
