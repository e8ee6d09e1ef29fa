//! Validated runtime configuration.
//!
//! [`Config::from_cli`] turns the raw [`Cli`] into typed, per-component
//! settings. Each component receives its own slice at construction; nothing
//! reads the environment after startup.

use crate::cli::{BackendArg, Cli};
use crate::error::ConfigError;
use crate::llm::{gemini, openai};
use crate::retry::RetryPolicy;
use crate::sources::guardian::SearchFilters;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Gemini,
}

/// Settings for the search API client and pagination.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_size: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub filters: SearchFilters,
}

/// Settings for the language-model backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub kind: BackendKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    /// Per-article analysis budget, independent of the HTTP retry budget.
    pub analyze_retry: RetryPolicy,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub guardian: GuardianConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    /// Enables the call-tracing decorator around the analysis backend.
    pub trace_calls: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let guardian_api_key = required(&cli.guardian_api_key, "GUARDIAN_API_KEY")?;

        let (kind, api_key, default_model, default_base) = match cli.backend {
            BackendArg::Gemini => (
                BackendKind::Gemini,
                required(&cli.gemini_api_key, "GEMINI_API_KEY")?,
                gemini::DEFAULT_MODEL,
                gemini::DEFAULT_BASE_URL,
            ),
            BackendArg::Openai => (
                BackendKind::OpenAi,
                required(&cli.openai_api_key, "OPENAI_API_KEY")?,
                openai::DEFAULT_MODEL,
                openai::DEFAULT_BASE_URL,
            ),
        };

        if cli.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "GUARDIAN_PAGE_SIZE",
                message: "must be at least 1".into(),
            });
        }
        let base_backoff = seconds(cli.base_backoff_secs, "BASE_BACKOFF_SECS")?;
        let max_backoff = seconds(cli.max_backoff_secs, "MAX_BACKOFF_SECS")?;
        if max_backoff < base_backoff {
            return Err(ConfigError::Invalid {
                key: "MAX_BACKOFF_SECS",
                message: "must not be smaller than BASE_BACKOFF_SECS".into(),
            });
        }
        let timeout = Duration::from_secs(cli.timeout_secs.max(1));

        Ok(Self {
            guardian: GuardianConfig {
                base_url: cli.guardian_base_url.clone(),
                api_key: guardian_api_key,
                page_size: cli.page_size,
                timeout,
                retry: RetryPolicy::new(cli.http_max_retries, base_backoff, max_backoff),
                filters: SearchFilters {
                    query: cli.query.clone(),
                    section: cli.section.clone(),
                    tag: cli.tag.clone(),
                    order_by: cli.order_by.clone(),
                    show_fields: cli.show_fields.clone(),
                },
            },
            llm: LlmConfig {
                kind,
                api_key,
                model: cli.model.clone().unwrap_or_else(|| default_model.to_string()),
                base_url: cli
                    .llm_base_url
                    .clone()
                    .unwrap_or_else(|| default_base.to_string()),
                timeout,
            },
            pipeline: PipelineConfig {
                output_dir: PathBuf::from(&cli.output_dir),
                analyze_retry: RetryPolicy::new(cli.analyze_max_retries, base_backoff, max_backoff),
                limit: cli.limit,
            },
            trace_calls: cli.trace,
        })
    }
}

/// A credential that must be present and non-blank.
fn required(value: &Option<String>, env_name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingCredential(env_name))
}

fn seconds(value: f64, key: &'static str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
