//! Run controller: one linear synchronization pass.
//!
//! A run resolves its window, searches, filters, then pushes each surviving
//! record through asset lookup, download, and metadata persistence. Each of
//! those steps fails independently and only ever skips the current record.
//! The run stops dispatching records once the wall-clock budget is spent or
//! an interrupt arrives, waits for in-flight records, and finally writes the
//! checkpoint.
//!
//! # Concurrency Model
//!
//! - Each record runs in its own Tokio task
//! - A semaphore permit is acquired before dispatching each record
//! - The stop flag is checked after the permit is acquired, so with one
//!   worker the behavior is strictly sequential
//! - The checkpoint is written only after every task has finished

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::asset::AssetResolver;
use crate::checkpoint::CheckpointStore;
use crate::config::{OutputLayout, SyncConfig};
use crate::error::{ErrorKind, RunError};
use crate::fetch::Fetcher;
use crate::filter::filter_records;
use crate::record::Record;
use crate::search::SearchClient;
use crate::window::{SyncWindow, end_of_day, start_of_day};

/// Optional explicit bounds for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// First day to synchronize; defaults to the checkpoint.
    pub start: Option<NaiveDate>,
    /// Last day to synchronize; defaults to now.
    pub end: Option<NaiveDate>,
}

/// Why the record loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every in-range record was dispatched.
    Completed,
    /// The run budget was exceeded.
    BudgetExceeded,
    /// An external interrupt stopped dispatching.
    Interrupted,
}

/// Pipeline step a record failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    /// Asset endpoint request.
    AssetLookup,
    /// Binary download.
    Download,
    /// Metadata write.
    Metadata,
}

/// Final state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Binary fetched and metadata written.
    Downloaded,
    /// Binary already on disk; metadata rewritten.
    AlreadyPresent,
    /// The asset endpoint had no usable link.
    NoAsset,
    /// A step failed; the record was skipped.
    Failed {
        /// Step that failed.
        stage: FailedStage,
        /// Error classification.
        kind: ErrorKind,
    },
}

/// Outcome of processing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// Record identifier.
    pub record_id: String,
    /// Final state.
    pub status: ItemStatus,
    /// Whether a new binary was written, even if a later step failed.
    pub fresh_download: bool,
}

impl ItemResult {
    fn new(record_id: &str, status: ItemStatus, fresh_download: bool) -> Self {
        Self {
            record_id: record_id.to_string(),
            status,
            fresh_download,
        }
    }
}

/// Observer notified as records are processed.
///
/// Rendering is left to the caller; the controller only reports events.
pub trait ProgressSink: Send + Sync {
    /// Called once with the number of in-range records.
    fn on_start(&self, _total: usize) {}

    /// Called after each record.
    fn on_item(&self, _result: &ItemResult) {}

    /// Called once after the record loop drains.
    fn on_finish(&self) {}
}

/// Per-run counters, updated from concurrent record tasks.
#[derive(Debug, Default)]
pub struct SyncStats {
    downloaded: AtomicUsize,
    already_present: AtomicUsize,
    no_asset: AtomicUsize,
    failed: AtomicUsize,
}

impl SyncStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that produced a new binary.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Records whose binary was already on disk.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::SeqCst)
    }

    /// Records skipped because no asset link was found.
    #[must_use]
    pub fn no_asset(&self) -> usize {
        self.no_asset.load(Ordering::SeqCst)
    }

    /// Records skipped because a step failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Records that went through the pipeline.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.downloaded() + self.already_present() + self.no_asset() + self.failed()
    }

    fn record(&self, result: &ItemResult) {
        let counter = match result.status {
            ItemStatus::Downloaded => &self.downloaded,
            ItemStatus::AlreadyPresent => &self.already_present,
            ItemStatus::NoAsset => &self.no_asset,
            ItemStatus::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn copy_of(other: &Self) -> Self {
        let copy = Self::new();
        copy.downloaded.store(other.downloaded(), Ordering::SeqCst);
        copy.already_present
            .store(other.already_present(), Ordering::SeqCst);
        copy.no_asset.store(other.no_asset(), Ordering::SeqCst);
        copy.failed.store(other.failed(), Ordering::SeqCst);
        copy
    }
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// Window that was requested.
    pub window: SyncWindow,
    /// Records returned by the search before date filtering.
    pub candidates: usize,
    /// Records inside the window.
    pub in_range: usize,
    /// Per-record counters.
    pub stats: SyncStats,
    /// Why the loop ended.
    pub stop_reason: StopReason,
    /// Date written to the checkpoint, if it was written.
    pub checkpoint_saved: Option<NaiveDate>,
}

/// The per-record steps, shared by all record tasks.
#[derive(Debug)]
struct ItemPipeline {
    resolver: AssetResolver,
    fetcher: Fetcher,
    layout: OutputLayout,
}

impl ItemPipeline {
    #[instrument(skip(self, record), fields(record_id = %record.id(), title = record.title()))]
    async fn process(&self, position: usize, record: &Record) -> ItemResult {
        let record_id = record.id();

        let asset = match self.resolver.resolve(record_id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                warn!(position, record_id, "no asset link, skipping");
                return ItemResult::new(record_id, ItemStatus::NoAsset, false);
            }
            Err(error) => {
                warn!(position, record_id, error = %error, "asset lookup failed, skipping");
                return ItemResult::new(
                    record_id,
                    ItemStatus::Failed {
                        stage: FailedStage::AssetLookup,
                        kind: error.kind(),
                    },
                    false,
                );
            }
        };

        let image_path = self.layout.image_path(asset.filename());
        let downloaded = match self.fetcher.fetch_if_absent(asset.href(), &image_path).await {
            Ok(downloaded) => downloaded,
            Err(error) => {
                warn!(
                    position,
                    record_id,
                    href = asset.href(),
                    error = %error,
                    "download failed, skipping"
                );
                return ItemResult::new(
                    record_id,
                    ItemStatus::Failed {
                        stage: FailedStage::Download,
                        kind: error.kind(),
                    },
                    false,
                );
            }
        };

        let metadata_path = self.layout.metadata_path(record_id);
        if let Err(error) = self.fetcher.persist_metadata(record, &metadata_path).await {
            warn!(
                position,
                record_id,
                error = %error,
                "failed to write metadata"
            );
            return ItemResult::new(
                record_id,
                ItemStatus::Failed {
                    stage: FailedStage::Metadata,
                    kind: error.kind(),
                },
                downloaded,
            );
        }

        let status = if downloaded {
            ItemStatus::Downloaded
        } else {
            debug!(position, record_id, "binary already present, metadata refreshed");
            ItemStatus::AlreadyPresent
        };
        ItemResult::new(record_id, status, downloaded)
    }
}

/// Orchestrates one synchronization pass.
pub struct SyncRunner {
    config: SyncConfig,
    search: SearchClient,
    pipeline: Arc<ItemPipeline>,
    checkpoint: CheckpointStore,
    interrupt: Arc<AtomicBool>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl std::fmt::Debug for SyncRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRunner")
            .field("config", &self.config)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

impl SyncRunner {
    /// Builds the runner and its clients from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Client`] if any HTTP client cannot be built.
    pub fn new(config: SyncConfig) -> Result<Self, RunError> {
        let search = SearchClient::new(&config)?;
        let pipeline = Arc::new(ItemPipeline {
            resolver: AssetResolver::new(&config)?,
            fetcher: Fetcher::new(&config)?,
            layout: config.layout.clone(),
        });
        let checkpoint = CheckpointStore::new(config.layout.checkpoint_path());

        debug!(
            api_base_url = %config.api_base_url,
            output = %config.layout.base().display(),
            max_runtime_secs = config.max_runtime.as_secs(),
            download_delay = ?config.download_delay,
            concurrency = config.concurrency,
            "creating sync runner"
        );

        Ok(Self {
            config,
            search,
            pipeline,
            checkpoint,
            interrupt: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Uses `flag` as the external interrupt signal.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Reports progress to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The checkpoint store this runner reads and writes.
    #[must_use]
    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Resolves the window for `request` at time `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidRange`] when the start falls after the end.
    pub async fn resolve_window(
        &self,
        request: RunRequest,
        now: NaiveDateTime,
    ) -> Result<SyncWindow, RunError> {
        let start = match request.start {
            Some(date) => start_of_day(date),
            None => self.checkpoint.load(now).await,
        };
        let end = request.end.map_or(now, end_of_day);
        SyncWindow::new(start, end)
    }

    /// Runs one pass against the current UTC time.
    ///
    /// # Errors
    ///
    /// See [`run_at`](Self::run_at).
    pub async fn run(&self, request: RunRequest) -> Result<RunReport, RunError> {
        self.run_at(request, Utc::now().naive_utc()).await
    }

    /// Runs one pass with `now` as the current time.
    ///
    /// Only setup problems are errors; every per-page and per-record
    /// failure is logged, counted, and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidRange`] before any network activity when
    /// the window is empty, and [`RunError::Setup`] when the output
    /// directories cannot be created.
    #[instrument(skip(self), fields(output = %self.config.layout.base().display()))]
    pub async fn run_at(
        &self,
        request: RunRequest,
        now: NaiveDateTime,
    ) -> Result<RunReport, RunError> {
        let window = self.resolve_window(request, now).await?;
        info!(
            start = %window.start().date(),
            end = %window.end().date(),
            "fetching image metadata"
        );

        self.config
            .layout
            .ensure_dirs()
            .await
            .map_err(|(path, source)| RunError::Setup { path, source })?;

        let candidates = self.search.search(&window).await;
        let candidate_count = candidates.len();
        let in_range: Vec<Record> = filter_records(candidates, &window).collect();
        let in_range_count = in_range.len();
        info!(
            candidates = candidate_count,
            in_range = in_range_count,
            "found items"
        );

        if let Some(progress) = &self.progress {
            progress.on_start(in_range_count);
        }

        let (stats, stop_reason) = self.process_records(in_range).await;

        if let Some(progress) = &self.progress {
            progress.on_finish();
        }

        let checkpoint_saved = if stop_reason == StopReason::Interrupted {
            warn!("interrupted, checkpoint left unchanged");
            None
        } else {
            self.save_checkpoint(window.checkpoint_date()).await
        };

        info!(
            downloaded = stats.downloaded(),
            already_present = stats.already_present(),
            no_asset = stats.no_asset(),
            failed = stats.failed(),
            processed = stats.processed(),
            in_range = in_range_count,
            ?stop_reason,
            "sync complete"
        );

        Ok(RunReport {
            window,
            candidates: candidate_count,
            in_range: in_range_count,
            stats,
            stop_reason,
            checkpoint_saved,
        })
    }

    async fn save_checkpoint(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.checkpoint.save(date).await {
            Ok(()) => Some(date),
            Err(e) => {
                error!(error = %e, "failed to save checkpoint; the next run will re-fetch this window");
                None
            }
        }
    }

    async fn process_records(&self, records: Vec<Record>) -> (SyncStats, StopReason) {
        let stats = Arc::new(SyncStats::new());
        let budget_stop = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let started = Instant::now();
        let mut interrupted = false;
        let mut handles = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.interrupt.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            if budget_stop.load(Ordering::SeqCst) {
                break;
            }

            let pipeline = Arc::clone(&self.pipeline);
            let stats = Arc::clone(&stats);
            let budget_stop = Arc::clone(&budget_stop);
            let progress = self.progress.clone();
            let delay = self.config.download_delay;
            let max_runtime = self.config.max_runtime;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = pipeline.process(index + 1, &record).await;

                if result.fresh_download && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                stats.record(&result);
                if let Some(progress) = &progress {
                    progress.on_item(&result);
                }

                check_budget(started, max_runtime, &budget_stop);
            }));
        }

        debug!(task_count = handles.len(), "waiting for in-flight records");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "record task panicked");
            }
        }

        let stop_reason = if interrupted {
            StopReason::Interrupted
        } else if budget_stop.load(Ordering::SeqCst) {
            StopReason::BudgetExceeded
        } else {
            StopReason::Completed
        };

        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| SyncStats::copy_of(&shared));
        (stats, stop_reason)
    }
}

fn check_budget(started: Instant, max_runtime: Duration, stop: &AtomicBool) {
    let elapsed = started.elapsed();
    if elapsed > max_runtime && !stop.swap(true, Ordering::SeqCst) {
        info!(
            elapsed_secs = elapsed.as_secs(),
            max_runtime_secs = max_runtime.as_secs(),
            "maximum runtime exceeded, stopping early"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn runner(base: &std::path::Path) -> SyncRunner {
        let config = SyncConfig::new(base).with_api_base_url("http://127.0.0.1:9");
        SyncRunner::new(config).unwrap()
    }

    #[test]
    fn test_sync_stats_record_counts_by_status() {
        let stats = SyncStats::new();
        stats.record(&ItemResult::new("a", ItemStatus::Downloaded, true));
        stats.record(&ItemResult::new("b", ItemStatus::AlreadyPresent, false));
        stats.record(&ItemResult::new("c", ItemStatus::NoAsset, false));
        stats.record(&ItemResult::new(
            "d",
            ItemStatus::Failed {
                stage: FailedStage::Metadata,
                kind: ErrorKind::Filesystem,
            },
            true,
        ));

        assert_eq!(stats.downloaded(), 1);
        assert_eq!(stats.already_present(), 1);
        assert_eq!(stats.no_asset(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.processed(), 4);

        let copy = SyncStats::copy_of(&stats);
        assert_eq!(copy.processed(), 4);
    }

    #[test]
    fn test_check_budget_sets_stop_once_exceeded() {
        let stop = AtomicBool::new(false);
        check_budget(Instant::now(), Duration::from_secs(3600), &stop);
        assert!(!stop.load(Ordering::SeqCst));

        let started = Instant::now().checked_sub(Duration::from_millis(5)).unwrap();
        check_budget(started, Duration::ZERO, &stop);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_resolve_window_uses_overrides() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = runner(temp.path());
        let now = date(2024, 3, 15).and_hms_opt(8, 0, 0).unwrap();

        let window = runner
            .resolve_window(
                RunRequest {
                    start: Some(date(2024, 3, 1)),
                    end: Some(date(2024, 3, 10)),
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(window.start(), start_of_day(date(2024, 3, 1)));
        assert_eq!(window.end(), end_of_day(date(2024, 3, 10)));
    }

    #[tokio::test]
    async fn test_resolve_window_defaults_to_lookback_and_now() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = runner(temp.path());
        let now = date(2024, 3, 15).and_hms_opt(8, 0, 0).unwrap();

        let window = runner
            .resolve_window(RunRequest::default(), now)
            .await
            .unwrap();

        assert_eq!(window.start(), now - chrono::Duration::days(3));
        assert_eq!(window.end(), now);
    }

    #[tokio::test]
    async fn test_resolve_window_reads_checkpoint() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = runner(temp.path());
        runner
            .checkpoint_store()
            .save(date(2024, 3, 10))
            .await
            .unwrap();
        let now = date(2024, 3, 15).and_hms_opt(8, 0, 0).unwrap();

        let window = runner
            .resolve_window(RunRequest::default(), now)
            .await
            .unwrap();

        assert_eq!(window.start(), start_of_day(date(2024, 3, 10)));
    }

    #[tokio::test]
    async fn test_run_rejects_inverted_range_before_touching_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let base = temp.path().join("mirror");
        let runner = runner(&base);
        let now = date(2024, 3, 15).and_hms_opt(8, 0, 0).unwrap();

        let result = runner
            .run_at(
                RunRequest {
                    start: Some(date(2024, 3, 11)),
                    end: Some(date(2024, 3, 10)),
                },
                now,
            )
            .await;

        assert!(matches!(result, Err(RunError::InvalidRange { .. })));
        assert!(!base.exists(), "no directories may be created for a usage error");
    }
}
