//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Incrementally mirror the NASA Image and Video Library.
///
/// Each run fetches images created since the last successful run (or the
/// last three days on a fresh mirror), skips files already on disk, and
/// refreshes their metadata.
#[derive(Parser, Debug)]
#[command(name = "nasa-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// First day to fetch (YYYY-MM-DD); defaults to the last checkpoint
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Last day to fetch (YYYY-MM-DD); defaults to now
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Mirror root directory holding images/, metadata/ and last_run.txt [default: .]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file path [default: $XDG_CONFIG_HOME/nasa-mirror/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Stop dispatching records after this many seconds [default: 7200]
    #[arg(long)]
    pub max_runtime_secs: Option<u64>,

    /// Pause after each fresh download in milliseconds (0 to disable, max 600000) [default: 3000]
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub download_delay_ms: Option<u64>,

    /// Records processed at once (1-16) [default: 1]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Image API base URL [default: https://images-api.nasa.gov]
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Search idle-read timeout in seconds (1-3600) [default: 20]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub search_timeout_secs: Option<u64>,

    /// Asset lookup idle-read timeout in seconds (1-3600) [default: 20]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub asset_timeout_secs: Option<u64>,

    /// Download idle-read timeout in seconds; slow but steady transfers are never cut off (1-3600) [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub download_timeout_secs: Option<u64>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD ({e})"))
}
