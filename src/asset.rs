//! Resolution of a record to its downloadable asset.
//!
//! The asset endpoint lists every rendition of a record. The first entry is
//! taken as the one to mirror; the API usually lists the original first, but
//! nothing checks that it is the highest resolution.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{RunError, SyncError};
use crate::http::build_http_client;

#[derive(Debug, Deserialize)]
struct AssetResponse {
    #[serde(default)]
    collection: AssetCollection,
}

#[derive(Debug, Default, Deserialize)]
struct AssetCollection {
    #[serde(default)]
    items: Vec<AssetEntry>,
}

#[derive(Debug, Deserialize)]
struct AssetEntry {
    href: Option<String>,
}

/// A resolved downloadable resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    href: String,
    filename: String,
}

impl Asset {
    /// Builds an asset from its location, or `None` if the location has no
    /// usable last path segment.
    #[must_use]
    pub fn from_href(href: impl Into<String>) -> Option<Self> {
        let href = href.into();
        let filename = filename_from_href(&href)?;
        Some(Self { href, filename })
    }

    /// Download location.
    #[must_use]
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Local file name: the last path segment of the location.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

fn filename_from_href(href: &str) -> Option<String> {
    let segment = match Url::parse(href) {
        Ok(url) => url.path_segments()?.next_back()?.to_string(),
        Err(_) => href
            .split(['?', '#'])
            .next()?
            .rsplit('/')
            .next()?
            .to_string(),
    };
    let segment = segment.trim();
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return None;
    }
    Some(segment.to_string())
}

/// Client for the asset lookup endpoint.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    client: Client,
    asset_url_prefix: String,
}

impl AssetResolver {
    /// Creates a resolver from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, RunError> {
        let client = build_http_client(config.timeouts.asset).map_err(|source| {
            RunError::Client {
                endpoint: "asset",
                source,
            }
        })?;
        Ok(Self {
            client,
            asset_url_prefix: config.asset_url_prefix(),
        })
    }

    /// Looks up the asset for `record_id`.
    ///
    /// Returns `Ok(None)` when the response is malformed, lists no assets, or
    /// the first entry has no usable location.
    ///
    /// # Errors
    ///
    /// Returns a transport error for network failures, timeouts, and non-2xx
    /// statuses. Callers skip the record either way.
    #[instrument(skip(self), fields(record_id = %record_id))]
    pub async fn resolve(&self, record_id: &str) -> Result<Option<Asset>, SyncError> {
        let url = format!(
            "{}/{}",
            self.asset_url_prefix,
            urlencoding::encode(record_id)
        );
        debug!(asset_url = %url, "looking up asset");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http_status(&url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::from_reqwest(&url, e))?;

        let parsed: AssetResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(error = %error, "asset response malformed");
                return Ok(None);
            }
        };

        let asset = parsed
            .collection
            .items
            .into_iter()
            .next()
            .and_then(|entry| entry.href)
            .and_then(Asset::from_href);
        Ok(asset)
    }
}
