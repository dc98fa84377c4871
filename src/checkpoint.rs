//! Persistence of the date the previous run ended at.
//!
//! The checkpoint is a single `YYYY-MM-DD` line. A missing or unreadable
//! checkpoint is not an error: the run falls back to a short lookback.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::CheckpointError;
use crate::window::start_of_day;

/// How far back a run reaches when no checkpoint is available.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 3;

const CHECKPOINT_FORMAT: &str = "%Y-%m-%d";

/// Reads and writes the checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored date at midnight, or `now` minus the default lookback.
    pub async fn load(&self, now: NaiveDateTime) -> NaiveDateTime {
        let fallback = now - Duration::days(DEFAULT_LOOKBACK_DAYS);
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint, using default lookback");
                return fallback;
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "checkpoint unreadable, using default lookback"
                );
                return fallback;
            }
        };

        match parse_checkpoint(&raw) {
            Some(date) => {
                debug!(path = %self.path.display(), %date, "loaded checkpoint");
                start_of_day(date)
            }
            None => {
                warn!(
                    path = %self.path.display(),
                    content = raw.trim(),
                    "checkpoint corrupt, using default lookback"
                );
                fallback
            }
        }
    }

    /// Overwrites the checkpoint with `date`.
    ///
    /// The new content is written to a sibling temporary file and renamed
    /// into place so a crash never leaves a half-written checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if the file cannot be written.
    pub async fn save(&self, date: NaiveDate) -> Result<(), CheckpointError> {
        let tmp_path = self.path.with_extension("txt.tmp");
        let content = format!("{}\n", date.format(CHECKPOINT_FORMAT));

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|source| CheckpointError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CheckpointError::Io {
                path: self.path.clone(),
                source,
            });
        }

        info!(path = %self.path.display(), %date, "checkpoint saved");
        Ok(())
    }
}

/// Parses checkpoint file content.
#[must_use]
pub fn parse_checkpoint(raw: &str) -> Option<NaiveDate> {
    let line = raw.trim().lines().next()?.trim();
    NaiveDate::parse_from_str(line, CHECKPOINT_FORMAT).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_checkpoint_accepts_trailing_whitespace() {
        assert_eq!(
            parse_checkpoint("2024-03-10\n"),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
        assert_eq!(
            parse_checkpoint("  2024-03-10  "),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
    }

    #[test]
    fn test_parse_checkpoint_rejects_garbage() {
        assert_eq!(parse_checkpoint(""), None);
        assert_eq!(parse_checkpoint("yesterday"), None);
        assert_eq!(parse_checkpoint("2024-13-01"), None);
        assert_eq!(parse_checkpoint("10/03/2024"), None);
    }

    #[tokio::test]
    async fn test_load_missing_file_defaults_to_lookback() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("last_run.txt"));
        let loaded = store.load(now()).await;
        assert_eq!(loaded, now() - Duration::days(3));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_defaults_to_lookback() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("last_run.txt");
        std::fs::write(&path, "not a date").unwrap();
        let store = CheckpointStore::new(&path);
        assert_eq!(store.load(now()).await, now() - Duration::days(3));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("last_run.txt"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        store.save(date).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "2024-03-10\n");
        let loaded = store.load(now()).await;
        assert_eq!(loaded, start_of_day(date));
        assert!(
            !temp.path().join("last_run.txt.tmp").exists(),
            "temporary file must not be left behind"
        );
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_value() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("last_run.txt"));
        store
            .save(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        store
            .save(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.load(now()).await.date(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("missing").join("last_run.txt"));
        let result = store
            .save(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
            .await;
        assert!(matches!(result, Err(CheckpointError::Io { .. })));
    }
}
