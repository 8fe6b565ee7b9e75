//! Binary entrypoint: load history, fold in one test run, persist, emit Insights JSON.
//!
//! Never fails the build over data problems: missing or malformed results and
//! a corrupt history file are logged and skipped, and a failed save is logged
//! while the Insights for the current run are still written.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;

use test_history::{Config, Engine, HistoryStore, RunContext};

#[derive(Parser, Debug)]
#[command(name = "test-history", version, about = "Track flaky and regressing tests across CI runs")]
struct Args {
  /// Test runner JSON report for this run.
  #[arg(long)]
  results: PathBuf,

  /// History file to read and update.
  #[arg(long, default_value = "test-history.json")]
  history: PathBuf,

  /// Where to write the Insights JSON (stdout when omitted).
  #[arg(long)]
  output: Option<PathBuf>,

  /// TOML file overriding the default thresholds.
  #[arg(long)]
  config: Option<PathBuf>,

  #[arg(long, env = "GITHUB_SHA")]
  commit: Option<String>,

  /// Defaults to GITHUB_HEAD_REF, then GITHUB_REF_NAME.
  #[arg(long, env = "GITHUB_HEAD_REF")]
  branch: Option<String>,

  /// Run timestamp (RFC 3339); defaults to now.
  #[arg(long)]
  timestamp: Option<DateTime<Utc>>,

  /// Classify without writing the history file back.
  #[arg(long)]
  no_persist: bool,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into()),
    )
    .with_writer(io::stderr)
    .with_ansi(false)
    .init();

  let args = Args::parse();

  let config = match &args.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };
  let engine = Engine::new(config);

  let branch = args
    .branch
    .clone()
    .filter(|b| !b.trim().is_empty())
    .or_else(|| std::env::var("GITHUB_REF_NAME").ok());
  let ctx = RunContext::new(
    args.commit.clone(),
    branch,
    args.timestamp.unwrap_or_else(Utc::now),
  );

  let results = match std::fs::read_to_string(&args.results) {
    Ok(s) => Some(s),
    Err(e) => {
      tracing::warn!(path = %args.results.display(), error = %e, "cannot read test results");
      None
    }
  };

  let mut store = HistoryStore::load(&args.history);
  let (insights, changed) = engine.process(&mut store, results.as_deref(), &ctx);

  if changed && !args.no_persist {
    if let Err(e) = store.save(&args.history) {
      tracing::error!(error = %e, "test history was NOT saved; this run is missing from history");
    }
  }

  let json = serde_json::to_string_pretty(&insights)?;
  match &args.output {
    Some(path) => {
      std::fs::write(path, format!("{}\n", json))
        .with_context(|| format!("writing insights to {}", path.display()))?;
    }
    None => {
      let mut out = io::stdout().lock();
      writeln!(out, "{}", json)?;
      out.flush()?;
    }
  }

  tracing::info!(
    flaky = insights.summary.flaky_count,
    failing = insights.summary.failing_count,
    slow = insights.summary.slow_count,
    "insights written"
  );
  Ok(())
}
