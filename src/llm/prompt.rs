//! The analysis prompt shared by every provider.

use crate::models::Article;

/// Number of body characters embedded in the prompt.
pub const BODY_PREVIEW_CHARS: usize = 1000;

/// System instruction for providers that support one.
pub const SYSTEM_INSTRUCTION: &str = "You are a news analysis engine that ONLY outputs JSON.";

/// Build the deterministic analysis prompt for `article`.
///
/// Only the title and the first [`BODY_PREVIEW_CHARS`] characters of the body
/// are sent.
pub fn build_prompt(article: &Article) -> String {
    let body: String = article.body.chars().take(BODY_PREVIEW_CHARS).collect();
    format!(
        r#"You are analysing a news article.

Title: {title}
Body (truncated to first {BODY_PREVIEW_CHARS} chars):
{body}

Return ONLY valid JSON with exactly these five fields:
{{
  "sentiment": float between -1 and 1,
  "summary": string of at most 3 sentences,
  "key_entities": [
    {{"text": string, "type": string, "salience": float between 0 and 1}}
  ],
  "topics": [string, ...],
  "confidence": float between 0 and 1
}}"#,
        title = article.title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article(title: &str, body: &str) -> Article {
        Article {
            id: "id".into(),
            title: title.into(),
            body: body.into(),
            section: None,
            publication: None,
            url: String::new(),
            raw: json!({}),
        }
    }

    #[test]
    fn test_prompt_embeds_title_and_schema() {
        let prompt = build_prompt(&article("Rates held steady", "The bank said..."));
        assert!(prompt.contains("Title: Rates held steady"));
        assert!(prompt.contains("The bank said..."));
        for field in ["\"sentiment\"", "\"summary\"", "\"key_entities\"", "\"topics\"", "\"confidence\""] {
            assert!(prompt.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_prompt_truncates_body_by_chars() {
        let body = format!("{}{}", "ü".repeat(BODY_PREVIEW_CHARS), "TAIL_MARKER");
        let prompt = build_prompt(&article("t", &body));
        assert!(prompt.contains(&"ü".repeat(BODY_PREVIEW_CHARS)));
        assert!(!prompt.contains("TAIL_MARKER"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = article("Same", "Same body");
        assert_eq!(build_prompt(&a), build_prompt(&a));
    }
}
