//! Resilient HTTP client for the upstream search API.
//!
//! [`ApiClient::execute`] performs one logical request:
//!
//! - injects the API key as a query parameter on a private copy of the params
//! - retries timeouts, connection failures, 429 and 5xx with exponential
//!   backoff and jitter (see [`RetryPolicy`]), honoring an integer
//!   `Retry-After` on 429 and 5xx alike
//! - fails immediately on 401/403 ([`RequestError::Auth`]) and other 4xx
//!   ([`RequestError::Client`])
//! - logs one record per attempt with redacted parameters; the key itself is
//!   never logged
//!
//! One `reqwest::Client` is reused across calls so connections are pooled.

use crate::error::RequestError;
use crate::retry::RetryPolicy;
use crate::utils::{redact_params, truncate_for_log};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Query parameters, kept ordered so diagnostics are stable.
pub type QueryParams = BTreeMap<String, String>;

/// Name of the query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "api-key";

const USER_AGENT: &str = concat!("guardian_analysis/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one API base URL and key.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    policy: RetryPolicy,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &crate::utils::REDACTED)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiClient {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, RequestError> {
        let base_url = Url::parse(base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Connection {
                url: base_url.to_string(),
                message: e.without_url().to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            policy,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, RequestError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    /// Execute `method endpoint?params` and decode the JSON body.
    ///
    /// The caller's `params` are never modified.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `endpoint` - Path joined onto the base URL, e.g. `/search`
    /// * `params` - Query parameters; the API key is added on a private copy
    ///
    /// # Returns
    ///
    /// The decoded JSON body of the first 2xx response.
    ///
    /// # Errors
    ///
    /// `Auth` and `Client` at once. `Timeout`, `Connection`, `Server` or
    /// `RateLimited` for the last failure once retries run out. `Malformed`
    /// when a 2xx body is not JSON.
    #[instrument(level = "info", skip_all, fields(%method, endpoint = %endpoint))]
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        params: &QueryParams,
    ) -> Result<Value, RequestError> {
        let url = self.endpoint_url(endpoint)?;
        let mut request_params = params.clone();
        request_params.insert(API_KEY_PARAM.to_string(), self.api_key.clone());
        let safe_params = redact_params(&request_params);

        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let sent = self
                .client
                .request(method.clone(), url.clone())
                .query(&request_params)
                .send()
                .await;

            let failure = match sent {
                Ok(resp) => {
                    let status = resp.status();
                    debug!(
                        attempt,
                        %method,
                        %url,
                        params = %safe_params,
                        status = status.as_u16(),
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        "HTTP attempt completed"
                    );
                    if status.is_success() {
                        match resp.bytes().await {
                            Ok(body) => {
                                return serde_json::from_slice(&body).map_err(|e| {
                                    RequestError::Malformed(format!(
                                        "non-JSON body from {url}: {e}"
                                    ))
                                });
                            }
                            Err(e) => transport_error(&url, e, attempt),
                        }
                    } else {
                        classify_status(resp, attempt).await
                    }
                }
                Err(e) => {
                    let err = transport_error(&url, e, attempt);
                    debug!(
                        attempt,
                        %method,
                        %url,
                        params = %safe_params,
                        error = %err,
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        "HTTP attempt failed"
                    );
                    err
                }
            };

            if !failure.is_retryable() {
                error!(attempt, error = %failure, "Request failed with non-retryable error");
                return Err(failure);
            }
            if attempt >= self.policy.max_attempts {
                error!(
                    attempt,
                    max = self.policy.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %failure,
                    "Request exhausted retries"
                );
                return Err(failure);
            }

            let delay = self.policy.backoff_delay(attempt, failure.retry_after());
            warn!(
                attempt,
                max = self.policy.max_attempts,
                ?delay,
                error = %failure,
                "Request attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Map a network-level `reqwest` failure, stripping the URL (and its query).
fn transport_error(url: &Url, e: reqwest::Error, attempts: u32) -> RequestError {
    let display_url = without_query(url);
    if e.is_timeout() {
        RequestError::Timeout {
            url: display_url,
            attempts,
        }
    } else {
        RequestError::Connection {
            url: display_url,
            message: e.without_url().to_string(),
        }
    }
}

/// Map a non-success response onto the error taxonomy.
async fn classify_status(resp: Response, attempts: u32) -> RequestError {
    let status = resp.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RequestError::Auth {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => RequestError::RateLimited {
            retry_after: parse_retry_after(resp.headers()),
            attempts,
        },
        s if s.is_server_error() => RequestError::Server {
            status: s.as_u16(),
            retry_after: parse_retry_after(resp.headers()),
            attempts,
        },
        s => {
            let body = resp.text().await.unwrap_or_default();
            RequestError::Client {
                status: s.as_u16(),
                body: truncate_for_log(&body, 200),
            }
        }
    }
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn without_query(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn client_for(server: &MockServer, max_attempts: u32) -> ApiClient {
        ApiClient::new(
            &server.uri(),
            "test-secret-key",
            Duration::from_secs(2),
            fast_policy(max_attempts),
        )
        .unwrap()
    }

    fn page_params() -> QueryParams {
        let mut p = QueryParams::new();
        p.insert("page".to_string(), "1".to_string());
        p
    }

    #[tokio::test]
    async fn test_execute_success_injects_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("api-key", "test-secret-key"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"status": "ok"}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 3);
        let params = page_params();
        let body = client.execute(Method::GET, "/search", &params).await.unwrap();
        assert_eq!(body["response"]["status"], "ok");
        // caller's mapping untouched
        assert!(!params.contains_key(API_KEY_PARAM));
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 4)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Auth { status: 401 }));
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 4)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Auth { status: 403 }));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 4)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        match err {
            RequestError::Client { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such endpoint");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let body = client_for(&server, 4)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Server {
                status: 500,
                retry_after: None,
                attempts: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error_honors_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(
            &server.uri(),
            "test-secret-key",
            Duration::from_secs(2),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_secs(5)),
        )
        .unwrap();
        let t0 = Instant::now();
        let body = client
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap();
        let waited = t0.elapsed();
        assert_eq!(body["ok"], true);
        assert!(waited >= Duration::from_secs(1), "waited only {waited:?}");
        assert!(waited < Duration::from_secs(3), "waited {waited:?}");
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_reports_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server, 2)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        match err {
            RequestError::RateLimited {
                retry_after,
                attempts,
            } => {
                assert_eq!(retry_after, Some(Duration::ZERO));
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let body = client_for(&server, 3)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap();
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ApiClient::new(
            &server.uri(),
            "k",
            Duration::from_millis(50),
            fast_policy(2),
        )
        .unwrap();
        let err = client
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Timeout { attempts: 2, .. }));
        assert!(!err.to_string().contains("api-key"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connection_error() {
        // Port 1 is reserved and closed on test hosts.
        let client = ApiClient::new(
            "http://127.0.0.1:1",
            "very-secret",
            Duration::from_secs(1),
            fast_policy(2),
        )
        .unwrap();
        let err = client
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Connection { .. }));
        assert!(!err.to_string().contains("very-secret"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .execute(Method::GET, "/search", &page_params())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = ApiClient::new(
            "https://content.guardianapis.com",
            "super-secret",
            Duration::from_secs(1),
            RetryPolicy::default(),
        )
        .unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<REDACTED>"));
    }

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let client = ApiClient::new(
            "https://content.guardianapis.com/",
            "k",
            Duration::from_secs(1),
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            client.endpoint_url("/search").unwrap().as_str(),
            "https://content.guardianapis.com/search"
        );
    }
}
