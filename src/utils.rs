//! Helpers for safe diagnostics and output directories.
//!
//! - Secret redaction for query parameters before they reach the logs
//! - String truncation for log previews
//! - File system validation for the output directory

use crate::http::QueryParams;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Placeholder written in place of a secret value.
pub const REDACTED: &str = "<REDACTED>";

/// Parameter names that look like credentials: anything containing key,
/// token, secret or password, and anything starting with `api`.
static SECRET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(key|token|secret|password|^api)").expect("secret-name pattern is valid")
});

/// Whether a parameter name should have its value hidden in diagnostics.
pub fn is_secret_key(name: &str) -> bool {
    SECRET_NAME.is_match(name)
}

/// Render query parameters for logging, with secret values replaced.
///
/// # Examples
///
/// ```ignore
/// let mut p = QueryParams::new();
/// p.insert("api-key".into(), "hunter2".into());
/// p.insert("page".into(), "1".into());
/// assert_eq!(redact_params(&p), "{api-key=<REDACTED>, page=1}");
/// ```
pub fn redact_params(params: &QueryParams) -> String {
    let body = params
        .iter()
        .map(|(k, v)| {
            if is_secret_key(k) {
                format!("{k}={REDACTED}")
            } else {
                format!("{k}={}", truncate_for_log(v, 80))
            }
        })
        .join(", ");
    format!("{{{body}}}")
}

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut and suffixed with
/// `"…(+N bytes)"`, where N counts the bytes dropped.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    if let Err(e) = fs::remove_file(&probe_path).await {
        debug!(probe = %probe_path.display(), error = %e, "Could not remove probe file");
    }
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_secret_key_names() {
        for name in [
            "api-key",
            "api_key",
            "API-KEY",
            "apiSecret",
            "access_token",
            "token",
            "password",
            "client_secret",
            "key",
        ] {
            assert!(is_secret_key(name), "{name} should be secret");
        }
        for name in ["page", "page-size", "q", "from-date", "show-fields", "section"] {
            assert!(!is_secret_key(name), "{name} should not be secret");
        }
    }

    #[test]
    fn test_redact_params_hides_values() {
        let p = params(&[
            ("api-key", "s3cr3t-guardian"),
            ("token", "tok-123"),
            ("password", "hunter2"),
            ("page", "2"),
        ]);
        let rendered = redact_params(&p);
        assert!(!rendered.contains("s3cr3t-guardian"));
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("api-key=<REDACTED>"));
        assert!(rendered.contains("page=2"));
    }

    #[test]
    fn test_redact_params_is_ordered() {
        let p = params(&[("q", "climate"), ("api-key", "x"), ("page", "1")]);
        assert_eq!(redact_params(&p), "{api-key=<REDACTED>, page=1, q=climate}");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("ééé…"));
        assert!(result.contains("(+14 bytes)"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/outputs");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_clears_stale_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("..__probe_write__");
        std::fs::write(&stale, b"left over").unwrap();
        ensure_writable_dir(tmp.path()).await.unwrap();
        assert!(!stale.exists());
    }
}
