//! # Guardian Analysis
//!
//! Fetches one day of articles from the Guardian Content API, sends each one
//! to a language model for structured analysis (sentiment, summary, entities,
//! topics) and writes the results as newline-delimited JSON.
//!
//! ## Usage
//!
//! ```sh
//! GUARDIAN_API_KEY=... GEMINI_API_KEY=... guardian_analysis --date 2025-05-06
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: paginated `/search` walk with retrying HTTP ([`http`], [`sources`])
//! 2. **Analyzing**: one LLM call per article, with its own retry budget ([`llm`], [`pipeline`])
//! 3. **Output**: JSONL success and failure files ([`outputs`])

use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod http;
mod llm;
mod models;
mod outputs;
mod pipeline;
mod retry;
mod sources;
mod utils;

use cli::Cli;
use config::Config;
use http::ApiClient;
use llm::{Backend, Traced};
use pipeline::Pipeline;
use sources::guardian::GuardianSource;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // `.env` never overrides variables already set in the environment.
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("guardian_analysis starting up");
    debug!(date = ?args.date, limit = ?args.limit, backend = ?args.backend, "Parsed CLI arguments");

    let config = match Config::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(stage = "config", error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    if let Err(e) = ensure_writable_dir(&config.pipeline.output_dir).await {
        error!(
            stage = "output",
            path = %config.pipeline.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let client = ApiClient::new(
        &config.guardian.base_url,
        config.guardian.api_key.clone(),
        config.guardian.timeout,
        config.guardian.retry,
    )
    .inspect_err(|e| error!(stage = "setup", error = %e, "Failed to build search client"))?;
    let backend = Backend::from_config(&config.llm)
        .inspect_err(|e| error!(stage = "setup", error = %e, "Failed to build LLM backend"))?;
    info!(model = %config.llm.model, trace_calls = config.trace_calls, "LLM backend ready");

    let date = args.date.unwrap_or_else(yesterday);
    let pipeline = Pipeline::new(
        GuardianSource::new(client),
        Traced::new(backend, config.trace_calls),
        config.guardian.filters.clone(),
        config.guardian.page_size,
        config.pipeline.clone(),
    );

    let report = match pipeline.run(date, config.pipeline.limit).await {
        Ok(report) => report,
        Err(e) => {
            error!(stage = "pipeline", %date, error = %e, "Run failed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        %date,
        fetched = report.fetched,
        successes = report.successes,
        failures = report.failures,
        output = %report.output_path.display(),
        failures_output = ?report.failures_path,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// The local calendar day before today.
fn yesterday() -> NaiveDate {
    let today = Local::now().date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}
