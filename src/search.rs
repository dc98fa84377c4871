//! Paginated search client.
//!
//! Pages are requested in order with `media_type=image` and a year range
//! until a page comes back empty. A failed page ends pagination and the
//! records gathered so far are returned.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{RunError, SyncError};
use crate::http::build_http_client;
use crate::record::Record;
use crate::window::SyncWindow;

/// Media type requested from the search endpoint.
pub const MEDIA_TYPE: &str = "image";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    collection: SearchCollection,
}

#[derive(Debug, Default, Deserialize)]
struct SearchCollection {
    #[serde(default)]
    items: Vec<Value>,
}

/// Client for the remote search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    search_url: String,
}

impl SearchClient {
    /// Creates a search client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, RunError> {
        let client = build_http_client(config.timeouts.search).map_err(|source| {
            RunError::Client {
                endpoint: "search",
                source,
            }
        })?;
        Ok(Self {
            client,
            search_url: config.search_url(),
        })
    }

    /// Fetches every page for the window's year range.
    ///
    /// Records are numbered by their position in the accumulated result so
    /// items without an identifier still get a stable fallback id.
    #[instrument(skip(self), fields(year_start = window.start_year(), year_end = window.end_year()))]
    pub async fn search(&self, window: &SyncWindow) -> Vec<Record> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let items = match self.fetch_page(window, page).await {
                Ok(items) => items,
                Err(error) => {
                    warn!(
                        page,
                        error = %error,
                        kind = error.kind().as_str(),
                        "search request failed, stopping pagination"
                    );
                    break;
                }
            };
            if items.is_empty() {
                debug!(page, "empty page, pagination complete");
                break;
            }

            debug!(page, items = items.len(), "fetched search page");
            for item in items {
                let position = records.len() + 1;
                records.push(Record::from_item(item, position));
            }
            page += 1;
        }

        info!(
            candidates = records.len(),
            pages_requested = page,
            "search complete"
        );
        records
    }

    /// Fetches a single page of raw items.
    ///
    /// # Errors
    ///
    /// Returns a transport error for network failures and non-2xx statuses,
    /// and a parse error for a body that is not a search response.
    pub async fn fetch_page(&self, window: &SyncWindow, page: u32) -> Result<Vec<Value>, SyncError> {
        let url = self.page_url(window, page)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http_status(url.as_str(), status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::from_reqwest(url.as_str(), e))?;
        let parsed: SearchResponse =
            serde_json::from_slice(&body).map_err(|e| SyncError::parse(url.as_str(), e))?;
        Ok(parsed.collection.items)
    }

    fn page_url(&self, window: &SyncWindow, page: u32) -> Result<Url, SyncError> {
        let mut url =
            Url::parse(&self.search_url).map_err(|_| SyncError::invalid_url(&self.search_url))?;
        url.query_pairs_mut()
            .append_pair("media_type", MEDIA_TYPE)
            .append_pair("page", &page.to_string())
            .append_pair("year_start", &window.start_year().to_string())
            .append_pair("year_end", &window.end_year().to_string());
        Ok(url)
    }
}
