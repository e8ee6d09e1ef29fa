//! Command-line interface definitions.
//!
//! Every tunable can come from a flag or an environment variable; `main`
//! loads a `.env` file first, so `.env` entries act as defaults beneath the
//! real environment.

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use crate::sources::guardian::{DEFAULT_BASE_URL, DEFAULT_ORDER_BY, DEFAULT_SHOW_FIELDS};

/// Which language-model provider analyzes the articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Gemini,
    Openai,
}

/// Fetch a day of Guardian articles and analyze each one with an LLM.
///
/// # Examples
///
/// ```sh
/// # Yesterday's articles, first 20 only
/// guardian_analysis --limit 20
///
/// # A specific day through OpenAI, with call tracing
/// guardian_analysis --date 2025-05-06 --backend openai --trace --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Publication date to analyze (YYYY-MM-DD). Defaults to yesterday.
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Analyze at most this many articles
    #[arg(short, long, env = "ANALYZE_LIMIT")]
    pub limit: Option<usize>,

    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log entry/exit timing around every analysis call
    #[arg(long, env = "TRACE_CALLS")]
    pub trace: bool,

    /// Guardian Content API key
    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    pub guardian_api_key: Option<String>,

    /// Guardian Content API base URL
    #[arg(long, env = "GUARDIAN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub guardian_base_url: String,

    /// Results per search page
    #[arg(long, env = "GUARDIAN_PAGE_SIZE", default_value_t = 10)]
    pub page_size: u32,

    /// Free-text search query
    #[arg(short, long)]
    pub query: Option<String>,

    /// Restrict to a section id (e.g. "world")
    #[arg(long)]
    pub section: Option<String>,

    /// Restrict to a tag id (e.g. "environment/climate-crisis")
    #[arg(long)]
    pub tag: Option<String>,

    /// Result ordering: newest, oldest or relevance
    #[arg(long, default_value = DEFAULT_ORDER_BY)]
    pub order_by: String,

    /// Comma-separated article fields to request
    #[arg(long, default_value = DEFAULT_SHOW_FIELDS)]
    pub show_fields: String,

    /// Language-model provider
    #[arg(long, env = "LLM_BACKEND", value_enum, default_value_t = BackendArg::Gemini)]
    pub backend: BackendArg,

    /// Gemini API key (required with --backend gemini)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// OpenAI API key (required with --backend openai)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Model name override
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Language-model API base URL override
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Directory for the JSONL output files
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: String,

    /// Attempts per HTTP request to the search API
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value_t = 4)]
    pub http_max_retries: u32,

    /// Analysis attempts per article
    #[arg(long, env = "ANALYZE_MAX_RETRIES", default_value_t = 3)]
    pub analyze_max_retries: u32,

    /// First retry delay in seconds; doubles per attempt
    #[arg(long, env = "BASE_BACKOFF_SECS", default_value_t = 1.0)]
    pub base_backoff_secs: f64,

    /// Upper bound on the retry delay before jitter, in seconds
    #[arg(long, env = "MAX_BACKOFF_SECS", default_value_t = 30.0)]
    pub max_backoff_secs: f64,

    /// Per-request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,
}
