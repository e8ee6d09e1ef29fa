//! OpenAI-compatible chat completions backend.
//!
//! Sends `POST {base_url}/v1/chat/completions` with JSON mode enabled and
//! temperature 0, then parses `choices[0].message.content`.

use super::{AnalysisBackend, parse, prompt, status_error};
use crate::config::LlmConfig;
use crate::error::AnalysisError;
use crate::models::{Article, ArticleAnalysis};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &crate::utils::REDACTED)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send `prompt` and return the raw text of the first choice.
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.without_url().to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::MalformedResponse("no choices in completion".into()))
    }
}

impl AnalysisBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(level = "info", skip_all, fields(model = %self.model, article_id = %article.id))]
    async fn analyze(&self, article: &Article) -> Result<ArticleAnalysis, AnalysisError> {
        let t0 = Instant::now();
        let text = self.complete(&prompt::build_prompt(article)).await?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, bytes = text.len(), "Completion received");
        parse::parse_analysis(&article.id, &text)
    }
}
