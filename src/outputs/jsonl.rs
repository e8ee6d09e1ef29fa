//! JSONL output for analysis results.
//!
//! Each file is written once per run, one serialized record per line. The
//! success file always exists after a run, even when it is empty, so
//! downstream consumers can tell "nothing succeeded" from "never ran".

use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::PipelineError;
use crate::models::{ArticleAnalysis, FailureRecord};

/// `{dir}/guardian_analysis_{date}.jsonl`
pub fn success_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("guardian_analysis_{}.jsonl", date.format("%Y-%m-%d")))
}

/// `{dir}/guardian_analysis_{date}_failures.jsonl`
pub fn failures_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "guardian_analysis_{}_failures.jsonl",
        date.format("%Y-%m-%d")
    ))
}

/// Serialize `records` one per line. An empty slice yields an empty string.
pub fn to_jsonl<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write the success stream. Always creates the file.
#[instrument(level = "info", skip_all, fields(output_dir = %dir.display(), %date, count = analyses.len()))]
pub async fn write_analyses(
    dir: &Path,
    date: NaiveDate,
    analyses: &[ArticleAnalysis],
) -> Result<PathBuf, PipelineError> {
    let path = success_path(dir, date);
    write_lines(&path, &to_jsonl(analyses)?).await?;
    info!(path = %path.display(), count = analyses.len(), "Wrote analyses");
    Ok(path)
}

/// Write the failure stream, or nothing when `failures` is empty.
#[instrument(level = "info", skip_all, fields(output_dir = %dir.display(), %date, count = failures.len()))]
pub async fn write_failures(
    dir: &Path,
    date: NaiveDate,
    failures: &[FailureRecord],
) -> Result<Option<PathBuf>, PipelineError> {
    if failures.is_empty() {
        return Ok(None);
    }
    let path = failures_path(dir, date);
    write_lines(&path, &to_jsonl(failures)?).await?;
    info!(path = %path.display(), count = failures.len(), "Wrote failure records");
    Ok(Some(path))
}

async fn write_lines(path: &Path, contents: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }
    fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    fn analysis(id: &str) -> ArticleAnalysis {
        ArticleAnalysis {
            article_id: id.into(),
            sentiment: 0.1,
            summary: "S.".into(),
            key_entities: vec![Entity {
                text: "UN".into(),
                kind: "ORG".into(),
                salience: 0.5,
            }],
            topics: vec!["world".into()],
            confidence: 0.9,
            raw_llm_response: json!({"sentiment": 0.1}),
        }
    }

    #[test]
    fn test_paths_use_iso_date() {
        let dir = Path::new("outputs");
        assert_eq!(
            success_path(dir, date()),
            Path::new("outputs/guardian_analysis_2025-05-06.jsonl")
        );
        assert_eq!(
            failures_path(dir, date()),
            Path::new("outputs/guardian_analysis_2025-05-06_failures.jsonl")
        );
    }

    #[tokio::test]
    async fn test_write_analyses_one_line_per_record() {
        let tmp = TempDir::new().unwrap();
        let path = write_analyses(tmp.path(), date(), &[analysis("a"), analysis("b")])
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["article_id"], "a");
        assert_eq!(lines[1]["key_entities"][0]["type"], "ORG");
    }

    #[tokio::test]
    async fn test_empty_success_file_still_written() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested/out");
        let path = write_analyses(&nested, date(), &[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_failures_file_only_when_needed() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(write_failures(tmp.path(), date(), &[]).await.unwrap(), None);
        assert!(!failures_path(tmp.path(), date()).exists());

        let record = FailureRecord {
            article_id: "x".into(),
            title: "T".into(),
            url: "u".into(),
            attempts: 3,
            error: "boom".into(),
        };
        let path = write_failures(tmp.path(), date(), &[record.clone()])
            .await
            .unwrap()
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let back: FailureRecord = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(back, record);
    }
}
