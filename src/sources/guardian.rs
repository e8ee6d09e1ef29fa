//! Guardian Content API search, walked page by page.
//!
//! [`GuardianSource::fetch_all`] returns a lazy stream of raw result records.
//! A page is only requested once every record of the previous page has been
//! consumed, so `stream.take(n)` never fetches more pages than it needs.
//!
//! The walk stops when the envelope reports `currentPage >= pages`, or as soon
//! as a page comes back empty.

use crate::error::RequestError;
use crate::http::{ApiClient, QueryParams};
use chrono::NaiveDate;
use futures::stream::{self, Stream};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info};

pub const SEARCH_PATH: &str = "/search";
pub const DEFAULT_BASE_URL: &str = "https://content.guardianapis.com";
pub const DEFAULT_SHOW_FIELDS: &str = "bodyText,headline,publication";
pub const DEFAULT_ORDER_BY: &str = "newest";

/// Optional narrowing of a day's search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub section: Option<String>,
    pub tag: Option<String>,
    pub order_by: String,
    pub show_fields: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: None,
            section: None,
            tag: None,
            order_by: DEFAULT_ORDER_BY.to_string(),
            show_fields: DEFAULT_SHOW_FIELDS.to_string(),
        }
    }
}

/// Build the `/search` parameters for every article published on `date`.
pub fn search_params(date: NaiveDate, filters: &SearchFilters, page_size: u32) -> QueryParams {
    let day = date.format("%Y-%m-%d").to_string();
    let mut params = QueryParams::new();
    params.insert("from-date".into(), day.clone());
    params.insert("to-date".into(), day);
    params.insert("show-fields".into(), filters.show_fields.clone());
    params.insert("order-by".into(), filters.order_by.clone());
    params.insert("page-size".into(), page_size.to_string());
    if let Some(q) = &filters.query {
        params.insert("q".into(), q.clone());
    }
    if let Some(section) = &filters.section {
        params.insert("section".into(), section.clone());
    }
    if let Some(tag) = &filters.tag {
        params.insert("tag".into(), tag.clone());
    }
    params
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    current_page: Option<u32>,
    pages: Option<u32>,
    #[serde(default)]
    results: Vec<Value>,
}

/// Walk state carried between stream polls.
struct PageCursor {
    params: QueryParams,
    next_page: Option<u32>,
    buffered: VecDeque<Value>,
}

/// Paginated access to the Guardian `/search` endpoint.
#[derive(Debug)]
pub struct GuardianSource {
    client: ApiClient,
}

impl GuardianSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Lazily yield every raw result matching `params`, page by page.
    ///
    /// `params` is copied; the `page` field is managed internally. Calling this
    /// again starts a fresh walk from page 1.
    ///
    /// # Arguments
    ///
    /// * `params` - Search parameters, typically from [`search_params`]
    ///
    /// # Returns
    ///
    /// A stream of raw result records in page order.
    ///
    /// # Errors
    ///
    /// A [`RequestError`] from the HTTP layer, or `Malformed` for a body
    /// without a `response` envelope. The error is yielded once and the
    /// stream then ends.
    pub fn fetch_all(
        &self,
        params: &QueryParams,
    ) -> impl Stream<Item = Result<Value, RequestError>> + '_ {
        let cursor = PageCursor {
            params: params.clone(),
            next_page: Some(1),
            buffered: VecDeque::new(),
        };

        stream::try_unfold(cursor, move |cursor| self.advance(cursor))
    }

    /// Pop the next buffered record, fetching the next page when the buffer is dry.
    async fn advance(
        &self,
        mut cursor: PageCursor,
    ) -> Result<Option<(Value, PageCursor)>, RequestError> {
        loop {
            if let Some(record) = cursor.buffered.pop_front() {
                return Ok(Some((record, cursor)));
            }
            let Some(page) = cursor.next_page else {
                return Ok(None);
            };

            cursor.params.insert("page".into(), page.to_string());
            let body = self
                .client
                .execute(Method::GET, SEARCH_PATH, &cursor.params)
                .await?;
            let envelope: SearchEnvelope = serde_json::from_value(body).map_err(|e| {
                RequestError::Malformed(format!("unexpected search envelope: {e}"))
            })?;
            let SearchPage {
                current_page,
                pages,
                results,
            } = envelope.response;

            let current = current_page.unwrap_or(page);
            let total = pages.unwrap_or(current);
            debug!(page, current, total, results = results.len(), "Fetched search page");

            cursor.next_page = if results.is_empty() || current >= total {
                info!(pages_walked = page, "Reached last search page");
                None
            } else {
                Some(page + 1)
            };
            cursor.buffered.extend(results);
        }
    }
}
