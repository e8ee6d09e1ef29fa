//! Data models for articles and their analyses.
//!
//! - [`Article`]: canonical form of one search result, built by [`Article::from_guardian`]
//! - [`ArticleAnalysis`] and [`Entity`]: structured LLM output for one article
//! - [`FailureRecord`]: an article whose analysis never succeeded
//!
//! Field names serialize in snake_case; these are the JSONL line shapes.

use crate::error::{AnalysisError, NormalizeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One news article, normalized from a raw search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Source-assigned id, e.g. `world/2025/may/06/some-story`.
    pub id: String,
    pub title: String,
    pub body: String,
    pub section: Option<String>,
    pub publication: Option<String>,
    pub url: String,
    /// The untouched search result, kept for debugging and audit.
    pub raw: Value,
}

impl Article {
    /// Normalize a raw Guardian search result.
    ///
    /// Missing optional fields fall back to `""` or `None`. Only a missing or
    /// non-string `id` is an error.
    ///
    /// Title priority: `fields.headline`, then `webTitle`, then `""`.
    pub fn from_guardian(raw: Value) -> Result<Self, NormalizeError> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or(NormalizeError::MissingId)?
            .to_string();

        let fields = raw.get("fields");
        let field = |name: &str| {
            fields
                .and_then(|f| f.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let top = |name: &str| raw.get(name).and_then(Value::as_str).map(str::to_string);

        let title = field("headline")
            .or_else(|| top("webTitle"))
            .unwrap_or_default();
        let body = field("bodyText").unwrap_or_default();
        let section = top("sectionName");
        let publication = field("publication");
        let url = top("webUrl").unwrap_or_default();

        Ok(Self {
            id,
            title,
            body,
            section,
            publication,
            url,
            raw,
        })
    }
}

/// A named entity the model found in an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// In `[0, 1]`.
    pub salience: f64,
}

/// Structured analysis of one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleAnalysis {
    pub article_id: String,
    /// In `[-1, 1]`.
    pub sentiment: f64,
    pub summary: String,
    pub key_entities: Vec<Entity>,
    pub topics: Vec<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// The backend's JSON answer, verbatim.
    pub raw_llm_response: Value,
}

/// Terminal failure for one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub attempts: u32,
    pub error: String,
}

impl FailureRecord {
    pub fn new(article: &Article, attempts: u32, error: &AnalysisError) -> Self {
        Self {
            article_id: article.id.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            attempts,
            error: error.to_string(),
        }
    }
}
