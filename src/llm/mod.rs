//! Language-model analysis of articles.
//!
//! # Architecture
//!
//! - [`AnalysisBackend`]: the capability the pipeline depends on
//! - [`openai::OpenAiBackend`], [`gemini::GeminiBackend`]: concrete providers
//! - [`Backend`]: runtime choice between providers, selected from config
//! - [`Traced`]: decorator that logs entry/exit timing around any backend
//!
//! Every provider shares the same prompt ([`prompt::build_prompt`]) and the
//! same defensive parser ([`parse::parse_analysis`]); only the wire format
//! differs. Retrying is not done here: the orchestrator owns the per-article
//! retry budget.

pub mod gemini;
pub mod openai;
pub mod parse;
pub mod prompt;

use crate::config::{BackendKind, LlmConfig};
use crate::error::AnalysisError;
use crate::models::{Article, ArticleAnalysis};
use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Something that can turn an article into a structured analysis.
pub trait AnalysisBackend {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Analyze a single article.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Auth`] is fatal for the article; every other variant
    /// is worth retrying.
    async fn analyze(&self, article: &Article) -> Result<ArticleAnalysis, AnalysisError>;
}

/// Map a provider's non-success status onto [`AnalysisError`].
pub(crate) fn status_error(status: StatusCode, body: &str) -> AnalysisError {
    let detail = truncate_for_log(body, 200);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::Auth {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::Quota(detail),
        s => AnalysisError::Transport(format!("HTTP {}: {detail}", s.as_u16())),
    }
}

/// The configured provider.
#[derive(Debug)]
pub enum Backend {
    OpenAi(openai::OpenAiBackend),
    Gemini(gemini::GeminiBackend),
}

impl Backend {
    pub fn from_config(config: &LlmConfig) -> Result<Self, AnalysisError> {
        Ok(match config.kind {
            BackendKind::OpenAi => Backend::OpenAi(openai::OpenAiBackend::new(config)?),
            BackendKind::Gemini => Backend::Gemini(gemini::GeminiBackend::new(config)?),
        })
    }
}

impl AnalysisBackend for Backend {
    fn name(&self) -> &str {
        match self {
            Backend::OpenAi(b) => b.name(),
            Backend::Gemini(b) => b.name(),
        }
    }

    async fn analyze(&self, article: &Article) -> Result<ArticleAnalysis, AnalysisError> {
        match self {
            Backend::OpenAi(b) => b.analyze(article).await,
            Backend::Gemini(b) => b.analyze(article).await,
        }
    }
}

/// Decorator that records entry, exit and elapsed time of every call.
///
/// Tracing is switched on per instance, from configuration, rather than by
/// changing global log levels mid-run.
pub struct Traced<B> {
    inner: B,
    enabled: bool,
}

impl<B> Traced<B> {
    pub fn new(inner: B, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

impl<B> fmt::Debug for Traced<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traced")
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<B> AnalysisBackend for Traced<B>
where
    B: AnalysisBackend,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    #[instrument(level = "debug", skip_all, fields(backend = %self.inner.name(), article_id = %article.id))]
    async fn analyze(&self, article: &Article) -> Result<ArticleAnalysis, AnalysisError> {
        if !self.enabled {
            return self.inner.analyze(article).await;
        }

        debug!(title = %truncate_for_log(&article.title, 80), "enter analyze");
        let t0 = Instant::now();
        let res = self.inner.analyze(article).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &res {
            Ok(analysis) => debug!(
                elapsed_ms,
                entities = analysis.key_entities.len(),
                topics = analysis.topics.len(),
                "exit analyze"
            ),
            Err(e) => warn!(elapsed_ms, error = %e, "exit analyze with error"),
        }
        res
    }
}
