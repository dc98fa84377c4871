//! Idempotent binary download and metadata persistence.
//!
//! Binaries are skipped when a file of the same name already exists, so
//! every file in the images directory must be complete: the body is streamed
//! into `<name>.part` and renamed into place only after the last byte is
//! flushed. Metadata is rewritten on every call.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::config::SyncConfig;
use crate::error::{RunError, SyncError};
use crate::http::build_http_client;
use crate::record::Record;

const PARTIAL_SUFFIX: &str = "part";

/// Downloads assets and writes record metadata.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, RunError> {
        let client = build_http_client(config.timeouts.download).map_err(|source| {
            RunError::Client {
                endpoint: "download",
                source,
            }
        })?;
        Ok(Self { client })
    }

    /// Downloads `href` to `dest` unless `dest` already exists.
    ///
    /// Returns `true` when a new file was written and `false` when the
    /// existing file was kept without any network call.
    ///
    /// # Errors
    ///
    /// Returns a transport error for network failures, timeouts, and non-2xx
    /// statuses, and an IO error when the file cannot be written. No partial
    /// file is left at `dest` on error.
    #[must_use = "the flag tells whether a fresh download happened"]
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn fetch_if_absent(&self, href: &str, dest: &Path) -> Result<bool, SyncError> {
        if tokio::fs::try_exists(dest)
            .await
            .map_err(|e| SyncError::io(dest, e))?
        {
            debug!("already present, skipping download");
            return Ok(false);
        }

        let response = self
            .client
            .get(href)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(href, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http_status(href, status.as_u16()));
        }

        let partial_path = partial_path_for(dest);
        let file = File::create(&partial_path)
            .await
            .map_err(|e| SyncError::io(partial_path.clone(), e))?;

        let stream_result = stream_to_file(file, response, href, &partial_path).await;
        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %partial_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial_path).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial_path, dest).await {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(SyncError::io(dest, e));
        }

        info!(path = %dest.display(), bytes = bytes_written, "download complete");
        Ok(true)
    }

    /// Writes the record's raw payload as pretty-printed JSON, replacing any
    /// previous file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be written.
    pub async fn persist_metadata(&self, record: &Record, dest: &Path) -> Result<(), SyncError> {
        write_metadata(record, dest).await
    }
}

/// Serializes a record's raw payload to `dest` through a temporary file.
///
/// # Errors
///
/// Returns an IO error when the file cannot be written.
pub async fn write_metadata(record: &Record, dest: &Path) -> Result<(), SyncError> {
    let mut json = serde_json::to_vec_pretty(record.raw()).map_err(|e| {
        SyncError::io(
            dest,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    json.push(b'\n');

    let tmp_path = partial_path_for(dest);
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| SyncError::io(tmp_path.clone(), e))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, dest).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(SyncError::io(dest, e));
    }

    debug!(path = %dest.display(), record_id = record.id(), "metadata written");
    Ok(())
}

/// Sibling path used while a file is being written.
fn partial_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    dest.with_file_name(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, SyncError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| SyncError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| SyncError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| SyncError::io(file_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| SyncError::io(file_path, e))?;

    Ok(bytes_written)
}
