//! Error types for every stage of the pipeline.
//!
//! Each component raises its own typed error:
//! - [`RequestError`]: the resilient HTTP client talking to the search API
//! - [`AnalysisError`]: the language-model backends
//! - [`NormalizeError`]: raw search records that cannot become an article
//! - [`ConfigError`]: missing or invalid configuration
//! - [`PipelineError`]: fatal, run-aborting failures surfaced to `main`
//!
//! Only the orchestrator converts a per-article [`AnalysisError`] into a
//! recorded, non-fatal outcome. Everything else propagates.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single logical request against the search API, after the
/// retry budget has been applied.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request (or reading its body) exceeded the client timeout.
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    /// DNS failure, refused or reset connection, and other network-level errors.
    #[error("connection error calling {url}: {message}")]
    Connection { url: String, message: String },

    /// 401 or 403. Never retried.
    #[error("authentication rejected with HTTP {status}")]
    Auth { status: u16 },

    /// Any other 4xx except 429. Never retried.
    #[error("client error HTTP {status}: {body}")]
    Client { status: u16, body: String },

    /// 5xx responses, still failing once retries ran out.
    #[error("server error HTTP {status} after {attempts} attempt(s)")]
    Server {
        status: u16,
        retry_after: Option<Duration>,
        attempts: u32,
    },

    /// 429 responses, still failing once retries ran out.
    #[error("rate limited after {attempts} attempt(s)")]
    RateLimited {
        retry_after: Option<Duration>,
        attempts: u32,
    },

    /// A 2xx body that is not JSON, or lacks the expected envelope.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RequestError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Timeout { .. }
                | RequestError::Connection { .. }
                | RequestError::Server { .. }
                | RequestError::RateLimited { .. }
        )
    }

    /// Server-provided delay from a 429 or 5xx `Retry-After` header.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RequestError::RateLimited { retry_after, .. }
            | RequestError::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of one analysis call against a language-model backend.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The backend rejected our credentials. Retrying cannot help.
    #[error("LLM authentication failed (HTTP {status})")]
    Auth { status: u16 },

    /// 429 / quota exhausted.
    #[error("LLM quota exceeded: {0}")]
    Quota(String),

    /// The backend answered, but not with a JSON object.
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    /// Network failures, 5xx, and unexpected statuses.
    #[error("LLM transport error: {0}")]
    Transport(String),
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnalysisError::Auth { .. })
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        // Drop the URL: some providers carry the key in the query string.
        AnalysisError::Transport(e.without_url().to_string())
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("search result has no string `id` field")]
    MissingId,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential: set {0} (environment or .env)")]
    MissingCredential(&'static str),

    #[error("invalid configuration for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch stage failed: {0}")]
    Fetch(#[from] RequestError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to serialize output record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_retryability() {
        assert!(
            RequestError::Timeout {
                url: "u".into(),
                attempts: 1
            }
            .is_retryable()
        );
        assert!(
            RequestError::Server {
                status: 502,
                retry_after: None,
                attempts: 1
            }
            .is_retryable()
        );
        assert!(
            RequestError::RateLimited {
                retry_after: None,
                attempts: 1
            }
            .is_retryable()
        );
        assert!(!RequestError::Auth { status: 401 }.is_retryable());
        assert!(
            !RequestError::Client {
                status: 404,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!RequestError::Malformed("x".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_on_rate_limit_and_server_errors() {
        let rl = RequestError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
            attempts: 2,
        };
        assert_eq!(rl.retry_after(), Some(Duration::from_secs(5)));
        let busy = RequestError::Server {
            status: 503,
            retry_after: Some(Duration::from_secs(2)),
            attempts: 1,
        };
        assert_eq!(busy.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(RequestError::Auth { status: 401 }.retry_after(), None);
    }

    #[test]
    fn test_analysis_auth_is_fatal() {
        assert!(!AnalysisError::Auth { status: 403 }.is_retryable());
        assert!(AnalysisError::Quota("slow down".into()).is_retryable());
        assert!(AnalysisError::MalformedResponse("nope".into()).is_retryable());
        assert!(AnalysisError::Transport("reset".into()).is_retryable());
    }
}
