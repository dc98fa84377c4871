//! Progress bar for sync runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use nasa_mirror_core::{ItemResult, ItemStatus, ProgressSink};

pub(crate) fn should_use_progress_bar(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

/// Renders per-record progress on stderr.
pub(crate) struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn on_start(&self, total: usize) {
        self.bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn on_item(&self, result: &ItemResult) {
        let label = match result.status {
            ItemStatus::Downloaded => "downloaded",
            ItemStatus::AlreadyPresent => "present",
            ItemStatus::NoAsset => "no asset",
            ItemStatus::Failed { .. } => "failed",
        };
        self.bar.set_message(format!("{} ({label})", result.record_id));
        self.bar.inc(1);
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }
}
