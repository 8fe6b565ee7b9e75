//! Persisted history: rolling run summaries plus per-test statistics.
//!
//! The store is loaded once per invocation, updated in memory and written back
//! in full. There is no locking; callers must not run two writers against the
//! same file at once.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::types::{ExtraFields, RunSummary, TestIdentity, TestStats};

pub const STORE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
  #[serde(default = "default_version")]
  pub version: String,
  /// Oldest first.
  #[serde(default)]
  pub runs: Vec<RunSummary>,
  #[serde(default)]
  pub tests: BTreeMap<TestIdentity, TestStats>,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

fn default_version() -> String {
  STORE_VERSION.to_string()
}

impl Default for HistoryStore {
  fn default() -> Self {
    Self {
      version: default_version(),
      runs: Vec::new(),
      tests: BTreeMap::new(),
      extra: ExtraFields::new(),
    }
  }
}

impl HistoryStore {
  pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(s)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  /// Read a store, distinguishing "no file yet" (`Ok(None)`) from corruption.
  pub fn load_strict(path: &Path) -> Result<Option<Self>, HistoryError> {
    let raw = match std::fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(HistoryError::corruption(path, format!("read: {}", e))),
    };
    Self::from_json(&raw)
      .map(Some)
      .map_err(|e| HistoryError::corruption(path, e.to_string()))
  }

  /// Read a store, falling back to an empty one when the file is missing or
  /// unreadable. Losing history beats blocking every later CI run.
  pub fn load(path: &Path) -> Self {
    match Self::load_strict(path) {
      Ok(Some(store)) => {
        tracing::info!(
          path = %path.display(),
          runs = store.runs.len(),
          tests = store.tests.len(),
          "loaded test history"
        );
        store
      }
      Ok(None) => {
        tracing::info!(path = %path.display(), "no test history yet; starting empty");
        Self::default()
      }
      Err(e) => {
        tracing::warn!(error = %e, "discarding unreadable test history; starting empty");
        Self::default()
      }
    }
  }

  /// Write the whole store atomically, creating parent directories.
  pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
    let persist_err = |source: std::io::Error| HistoryError::Persist {
      path: path.to_path_buf(),
      source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let json = self.to_json()?;
    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
      .write(|file| {
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")
      })
      .map_err(|error| match error {
        atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => persist_err(e),
      })?;

    tracing::info!(path = %path.display(), runs = self.runs.len(), tests = self.tests.len(), "saved test history");
    Ok(())
  }
}
