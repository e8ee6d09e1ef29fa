//! Defensive parsing of a model's JSON answer into an [`ArticleAnalysis`].
//!
//! Models drift from the requested schema, so each field is extracted on its
//! own with a type-coerced default. A malformed entity is dropped without
//! failing the rest. The only hard failure is an answer that is not a JSON
//! object at all.

use crate::error::AnalysisError;
use crate::models::{ArticleAnalysis, Entity};
use crate::utils::truncate_for_log;
use serde_json::{Map, Value};
use tracing::debug;

/// Parse `text` (the model's reply) for the article `article_id`.
pub fn parse_analysis(article_id: &str, text: &str) -> Result<ArticleAnalysis, AnalysisError> {
    let value: Value = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        AnalysisError::MalformedResponse(format!(
            "{e}; reply was: {}",
            truncate_for_log(text, 200)
        ))
    })?;
    from_value(article_id, value)
}

/// Build an analysis from an already-decoded reply.
pub fn from_value(article_id: &str, value: Value) -> Result<ArticleAnalysis, AnalysisError> {
    let Some(data) = value.as_object() else {
        return Err(AnalysisError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            truncate_for_log(&value.to_string(), 200)
        )));
    };

    let sentiment = number(data.get("sentiment")).unwrap_or(0.0).clamp(-1.0, 1.0);
    let confidence = number(data.get("confidence")).unwrap_or(0.0).clamp(0.0, 1.0);
    let summary = data
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let topics = data
        .get("topics")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_to_string).collect())
        .unwrap_or_default();
    let key_entities = data
        .get("key_entities")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_entity).collect())
        .unwrap_or_default();

    Ok(ArticleAnalysis {
        article_id: article_id.to_string(),
        sentiment,
        summary,
        key_entities,
        topics,
        confidence,
        raw_llm_response: value,
    })
}

fn parse_entity(value: &Value) -> Option<Entity> {
    let Some(obj) = value.as_object() else {
        debug!(entity = %truncate_for_log(&value.to_string(), 80), "Skipping non-object entity");
        return None;
    };
    let Some(text) = obj.get("text").and_then(Value::as_str) else {
        debug!(entity = %truncate_for_log(&value.to_string(), 80), "Skipping entity without text");
        return None;
    };
    let salience = match obj.get("salience") {
        None | Some(Value::Null) => 0.0,
        Some(v) => number(Some(v))?.clamp(0.0, 1.0),
    };
    Some(Entity {
        text: text.to_string(),
        kind: field_str(obj, "type").unwrap_or_else(|| "UNKNOWN".to_string()),
        salience,
    })
}

/// Accept JSON numbers and numeric strings.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn field_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Some models wrap JSON in a Markdown fence despite being told not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
