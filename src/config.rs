//! Run configuration, built once at startup and handed to each component.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default NASA Image and Video Library API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://images-api.nasa.gov";

/// Default wall-clock budget for one run (2 hours).
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(2 * 60 * 60);

/// Default pause after each fresh download.
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_secs(3);

/// Default number of records processed at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound for the worker count.
pub const MAX_CONCURRENCY: usize = 16;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const SEARCH_TIMEOUT_SECS: u64 = 20;
const ASSET_TIMEOUT_SECS: u64 = 20;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

const IMAGES_DIR: &str = "images";
const METADATA_DIR: &str = "metadata";
const CHECKPOINT_FILE: &str = "last_run.txt";

/// Connect and idle-read timeouts for one endpoint.
///
/// There is no cap on the total transfer time: a large body that keeps
/// arriving is never cut off, only a stalled one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointTimeout {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Longest wait for the next bytes of the response, headers or body.
    pub read: Duration,
}

impl EndpointTimeout {
    /// Creates a timeout pair from an idle-read timeout in seconds and the default connect timeout.
    #[must_use]
    pub fn from_secs(read_secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS.min(read_secs.max(1))),
            read: Duration::from_secs(read_secs),
        }
    }
}

/// Independent timeouts for the three remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Search page requests.
    pub search: EndpointTimeout,
    /// Asset lookups.
    pub asset: EndpointTimeout,
    /// Binary downloads.
    pub download: EndpointTimeout,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            search: EndpointTimeout::from_secs(SEARCH_TIMEOUT_SECS),
            asset: EndpointTimeout::from_secs(ASSET_TIMEOUT_SECS),
            download: EndpointTimeout::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

/// On-disk layout of the mirror under one base directory.
///
/// ```text
/// <base>/images/<asset filename>
/// <base>/metadata/index-<id>.json
/// <base>/last_run.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    /// Creates a layout rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding downloaded binaries.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.base.join(IMAGES_DIR)
    }

    /// Directory holding per-record metadata files.
    #[must_use]
    pub fn metadata_dir(&self) -> PathBuf {
        self.base.join(METADATA_DIR)
    }

    /// Location of the checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.base.join(CHECKPOINT_FILE)
    }

    /// Destination of a downloaded binary.
    #[must_use]
    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir().join(filename)
    }

    /// Destination of a record's metadata file.
    #[must_use]
    pub fn metadata_path(&self, record_id: &str) -> PathBuf {
        self.metadata_dir()
            .join(format!("index-{}.json", sanitize_filename(record_id)))
    }

    /// Creates the images and metadata directories.
    ///
    /// # Errors
    ///
    /// Returns the failing directory and IO error.
    pub async fn ensure_dirs(&self) -> Result<(), (PathBuf, std::io::Error)> {
        for dir in [self.images_dir(), self.metadata_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| (dir.clone(), e))?;
        }
        Ok(())
    }
}

/// Everything a run needs, resolved from CLI flags, config file, and defaults.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Output directory layout.
    pub layout: OutputLayout,
    /// API base URL (search at `/search`, assets at `/asset/<id>`).
    pub api_base_url: String,
    /// Per-endpoint timeouts.
    pub timeouts: HttpTimeouts,
    /// Wall-clock budget after which no new record is dispatched.
    pub max_runtime: Duration,
    /// Pause after each fresh download.
    pub download_delay: Duration,
    /// Records processed at once (1 = sequential).
    pub concurrency: usize,
}

impl SyncConfig {
    /// Creates a configuration with defaults for everything but the output directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: OutputLayout::new(base_dir),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeouts: HttpTimeouts::default(),
            max_runtime: DEFAULT_MAX_RUNTIME,
            download_delay: DEFAULT_DOWNLOAD_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Overrides the API base URL; a trailing slash is dropped.
    #[must_use]
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.api_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the run budget.
    #[must_use]
    pub fn with_max_runtime(mut self, max_runtime: Duration) -> Self {
        self.max_runtime = max_runtime;
        self
    }

    /// Overrides the post-download delay.
    #[must_use]
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    /// Overrides the worker count, clamped to `1..=MAX_CONCURRENCY`.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Overrides the per-endpoint timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Search endpoint URL.
    #[must_use]
    pub fn search_url(&self) -> String {
        format!("{}/search", self.api_base_url)
    }

    /// Asset endpoint URL prefix (the record id is appended as a path segment).
    #[must_use]
    pub fn asset_url_prefix(&self) -> String {
        format!("{}/asset", self.api_base_url)
    }
}

/// Replaces characters that are unsafe in file names.
///
/// Path separators, Windows-reserved characters, and control characters
/// become `_`; names made only of dots are neutralised.
#[must_use]
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized.chars().all(|c| c == '.') {
        return sanitized.replace('.', "_");
    }
    sanitized
}
