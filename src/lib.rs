//! NASA Mirror Core Library
//!
//! Incrementally mirrors the NASA Image and Video Library to local disk. A
//! run picks a date window (explicit, or resumed from the last checkpoint),
//! pages through the search endpoint, keeps the records created inside the
//! window, and for each one resolves its asset, downloads the binary if it is
//! not already present, and rewrites its metadata file.
//!
//! # Architecture
//!
//! - [`checkpoint`] - Persisted end date of the last successful run
//! - [`search`] - Paginated search client
//! - [`filter`] - Declared-date extraction and window filtering
//! - [`asset`] - Asset lookup for a single record
//! - [`fetch`] - Idempotent download and metadata persistence
//! - [`runner`] - Run controller with time budget and failure isolation
//!
//! # Example
//!
//! ```no_run
//! use nasa_mirror_core::{RunRequest, SyncConfig, SyncRunner};
//!
//! # async fn example() -> Result<(), nasa_mirror_core::RunError> {
//! let runner = SyncRunner::new(SyncConfig::new("."))?;
//! let report = runner.run(RunRequest::default()).await?;
//! println!("downloaded {}", report.stats.downloaded());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod asset;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
mod http;
pub mod record;
pub mod runner;
pub mod search;
mod user_agent;
pub mod window;

// Re-export commonly used types
pub use asset::{Asset, AssetResolver};
pub use checkpoint::{CheckpointStore, DEFAULT_LOOKBACK_DAYS};
pub use config::{
    DEFAULT_API_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_DOWNLOAD_DELAY, DEFAULT_MAX_RUNTIME,
    EndpointTimeout, HttpTimeouts, MAX_CONCURRENCY, OutputLayout, SyncConfig,
};
pub use error::{CheckpointError, ErrorKind, RunError, SyncError};
pub use fetch::Fetcher;
pub use filter::{extract_declared_date, filter_records, parse_timestamp};
pub use record::Record;
pub use runner::{
    FailedStage, ItemResult, ItemStatus, ProgressSink, RunReport, RunRequest, StopReason,
    SyncRunner, SyncStats,
};
pub use search::SearchClient;
pub use window::SyncWindow;
