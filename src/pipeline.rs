//! Fetch, analyze and persist one day of articles.
//!
//! The [`Pipeline`] drives the whole run:
//! 1. **Fetching**: walk the search pages lazily, stopping at `limit`
//! 2. **Normalizing**: turn raw results into [`Article`]s, skipping records without an id
//! 3. **Analyzing**: each article in input order, with its own retry budget
//! 4. **Output**: a JSONL success file and, if needed, a failures file
//!
//! Only a fetch or write failure aborts the run. An article that exhausts its
//! retries becomes a [`FailureRecord`] and the run carries on.

use chrono::NaiveDate;
use futures::future;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, RequestError};
use crate::llm::AnalysisBackend;
use crate::models::{Article, ArticleAnalysis, FailureRecord};
use crate::outputs::jsonl;
use crate::sources::guardian::{GuardianSource, SearchFilters, search_params};

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub date: NaiveDate,
    /// Articles that reached the analysis stage.
    pub fetched: usize,
    pub successes: usize,
    pub failures: usize,
    /// Successful analyses, in input order. Same content as `output_path`.
    pub analyses: Vec<ArticleAnalysis>,
    /// Terminal failures, in input order.
    pub failure_records: Vec<FailureRecord>,
    pub output_path: PathBuf,
    pub failures_path: Option<PathBuf>,
}

pub struct Pipeline<B> {
    source: GuardianSource,
    backend: B,
    filters: SearchFilters,
    page_size: u32,
    settings: PipelineConfig,
}

impl<B> Pipeline<B>
where
    B: AnalysisBackend,
{
    pub fn new(
        source: GuardianSource,
        backend: B,
        filters: SearchFilters,
        page_size: u32,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            source,
            backend,
            filters,
            page_size,
            settings,
        }
    }

    /// Process every article published on `date`, or the first `limit` of them.
    ///
    /// # Arguments
    ///
    /// * `date` - Publication day to search for
    /// * `limit` - Maximum number of articles to analyze; `None` means all
    ///
    /// # Returns
    ///
    /// A [`RunReport`] holding the success and failure records and the paths
    /// of the files they were written to.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Fetch`] if the search stage fails, or an output error
    /// if a file cannot be written. Per-article failures never end up here.
    #[instrument(level = "info", skip_all, fields(%date, backend = %self.backend.name()))]
    pub async fn run(
        &self,
        date: NaiveDate,
        limit: Option<usize>,
    ) -> Result<RunReport, PipelineError> {
        let t0 = Instant::now();
        let articles = self.fetch(date, limit).await?;
        let fetched = articles.len();
        info!(count = fetched, "Total articles to analyze");

        let mut analyses: Vec<ArticleAnalysis> = Vec::with_capacity(fetched);
        let mut failures: Vec<FailureRecord> = Vec::new();
        for (index, article) in articles.iter().enumerate() {
            match self.analyze_with_retry(index, article).await {
                Ok(analysis) => analyses.push(analysis),
                Err(failure) => failures.push(failure),
            }
        }

        let output_path = jsonl::write_analyses(&self.settings.output_dir, date, &analyses).await?;
        let failures_path = jsonl::write_failures(&self.settings.output_dir, date, &failures).await?;

        let report = RunReport {
            date,
            fetched,
            successes: analyses.len(),
            failures: failures.len(),
            analyses,
            failure_records: failures,
            output_path,
            failures_path,
        };
        info!(
            fetched = report.fetched,
            successes = report.successes,
            failures = report.failures,
            output = %report.output_path.display(),
            failures_output = ?report.failures_path,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }

    /// Pull up to `limit` normalized articles.
    ///
    /// Records without an id are dropped before the limit applies, so they do
    /// not use up the budget. The stream is lazy, so pages past the limit are
    /// never requested.
    async fn fetch(
        &self,
        date: NaiveDate,
        limit: Option<usize>,
    ) -> Result<Vec<Article>, PipelineError> {
        let params = search_params(date, &self.filters, self.page_size);
        let mut skipped = 0usize;
        let articles: Vec<Article> = self
            .source
            .fetch_all(&params)
            .try_filter_map(|record| {
                let article = match Article::from_guardian(record) {
                    Ok(article) => Some(article),
                    Err(e) => {
                        skipped += 1;
                        warn!(error = %e, "Skipping unusable search result");
                        None
                    }
                };
                future::ready(Ok::<_, RequestError>(article))
            })
            .take(limit.unwrap_or(usize::MAX))
            .try_collect()
            .await
            .inspect_err(|e| error!(error = %e, "Fetching articles failed"))?;

        if skipped > 0 {
            warn!(skipped, "Some search results were not articles");
        }
        Ok(articles)
    }

    /// Analyze one article, retrying until success, a fatal error or an
    /// exhausted budget. The error side is the article's terminal record.
    #[instrument(level = "info", skip_all, fields(article_id = %article.id))]
    async fn analyze_with_retry(
        &self,
        index: usize,
        article: &Article,
    ) -> Result<ArticleAnalysis, FailureRecord> {
        let policy = &self.settings.analyze_retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.backend.analyze(article).await {
                Ok(analysis) => {
                    info!(index, attempt, "Successfully analyzed article");
                    return Ok(analysis);
                }
                Err(e) if !e.is_retryable() => {
                    error!(index, attempt, error = %e, "Analysis failed with a non-retryable error");
                    return Err(FailureRecord::new(article, attempt, &e));
                }
                Err(e) if attempt >= policy.max_attempts => {
                    error!(
                        index,
                        attempt,
                        max = policy.max_attempts,
                        error = %e,
                        "Analysis exhausted retries"
                    );
                    return Err(FailureRecord::new(article, attempt, &e));
                }
                Err(e) => {
                    let delay = policy.backoff_delay(attempt, None);
                    warn!(
                        index,
                        attempt,
                        max = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Analysis failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
