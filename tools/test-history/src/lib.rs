//! Test History Engine — rolling flakiness and trend tracking for CI test runs.
//!
//! Ingests one test-runner result tree per run, folds it into a bounded
//! history store, scores every test for flakiness and classifies tests into
//! flaky, failing, slow, improved and degraded buckets.
//!
//! No network; pure computation plus one JSON history file.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod insights;
pub mod score;
pub mod store;
pub mod types;
pub mod update;

pub use config::Config;
pub use engine::Engine;
pub use error::HistoryError;
pub use store::HistoryStore;
pub use types::{Insights, RunContext, TestIdentity, TestStats, TestStatus};
