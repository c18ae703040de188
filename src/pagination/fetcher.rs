//! Page fetcher
//!
//! Drives one paginated endpoint from the first page to the last as a lazy,
//! finite stream. Pages are requested strictly one after another: each cursor
//! comes from the previous response.

use super::link_header::LinkHeaderPaginator;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::types::{JsonValue, QueryParams};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tracing::debug;

/// One page of records
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based position in the pagination sequence
    pub number: usize,
    /// Records in upstream order
    pub records: Vec<JsonValue>,
    /// Opaque URL of the next page, if any
    pub next_cursor: Option<String>,
}

impl Page {
    /// Whether this is the terminal page
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Where the next request goes
enum Cursor {
    /// Endpoint URL plus the caller's query parameters
    First { url: String, query: QueryParams },
    /// Cursor URL, requested verbatim
    Next(String),
    Exhausted,
}

/// Fetches pages for an endpoint
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Arc<HttpClient>,
    base_url: String,
    paginator: LinkHeaderPaginator,
}

impl PageFetcher {
    /// Create a fetcher for endpoints under `base_url`
    pub fn new(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            paginator: LinkHeaderPaginator::default(),
        }
    }

    /// Base URL endpoints are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the first page of `endpoint`
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}.json", self.base_url.trim_end_matches('/'))
    }

    /// Stream every page of `endpoint`.
    ///
    /// `query` is sent with the first request only. An error is yielded once
    /// and ends the stream; a fresh call starts over from page one.
    pub fn fetch<'a>(
        &'a self,
        endpoint: &'a str,
        query: QueryParams,
    ) -> impl Stream<Item = Result<Page>> + Send + 'a {
        let start = Cursor::First {
            url: self.endpoint_url(endpoint),
            query,
        };

        stream::try_unfold((start, 0usize), move |(cursor, fetched)| async move {
            let (url, query) = match cursor {
                Cursor::First { url, query } => (url, Some(query)),
                Cursor::Next(url) => (url, None),
                Cursor::Exhausted => return Ok::<_, Error>(None),
            };

            let number = fetched + 1;
            let page = self
                .fetch_page(endpoint, &url, query.as_ref(), number)
                .await?;

            let next = match &page.next_cursor {
                Some(next_url) => Cursor::Next(next_url.clone()),
                None => Cursor::Exhausted,
            };
            Ok::<_, Error>(Some((page, (next, number))))
        })
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        url: &str,
        query: Option<&QueryParams>,
        number: usize,
    ) -> Result<Page> {
        let response = self.client.get(endpoint, url, query).await?;

        let next_cursor = self
            .paginator
            .next_cursor(response.headers())
            .map_err(|message| Error::malformed(endpoint, message))?;

        // A body that stalls or breaks off is a connectivity failure, not bad data
        let raw = response.bytes().await.map_err(|e| {
            Error::unreachable(endpoint, format!("failed reading response body: {e}"))
        })?;
        let body: JsonValue = serde_json::from_slice(&raw)
            .map_err(|e| Error::malformed(endpoint, format!("invalid JSON body: {e}")))?;
        let records = extract_records(body, endpoint)?;

        debug!(
            endpoint,
            page = number,
            records = records.len(),
            has_next = next_cursor.is_some(),
            "fetched page"
        );

        Ok(Page {
            number,
            records,
            next_cursor,
        })
    }
}

/// Pull the record array stored under the endpoint's name
fn extract_records(body: JsonValue, endpoint: &str) -> Result<Vec<JsonValue>> {
    let records = match body {
        JsonValue::Object(mut map) => map.remove(endpoint),
        _ => None,
    };

    match records {
        Some(JsonValue::Array(records)) => Ok(records),
        Some(other) => Err(Error::malformed(
            endpoint,
            format!("expected an array under '{endpoint}', found {}", type_name(&other)),
        )),
        None => Err(Error::malformed(
            endpoint,
            format!("response has no top-level '{endpoint}' key"),
        )),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
