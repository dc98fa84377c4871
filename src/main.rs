//! CLI entry point for the NASA image mirror.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use nasa_mirror_core::{RunRequest, StopReason, SyncRunner};
use tracing::{debug, error, info, warn};

mod app_config;
mod cli;
mod progress;

use cli::Args;

/// Process outcome mapped to an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    Usage,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Usage => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info).
fn init_tracing(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(args: Args) -> Result<ProcessExit> {
    debug!(?args, "CLI arguments parsed");

    let file_config = match app_config::load_file_config(args.config.as_deref()) {
        Ok(file_config) => file_config,
        Err(e) => {
            error!("{e:#}");
            return Ok(ProcessExit::Usage);
        }
    };
    let config = app_config::resolve_sync_config(&args, file_config.as_ref());
    info!(output = %config.layout.base().display(), "NASA mirror starting");

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let mut runner = SyncRunner::new(config)?.with_interrupt_flag(Arc::clone(&interrupted));
    if progress::should_use_progress_bar(
        io::stderr().is_terminal(),
        args.quiet,
        progress::is_dumb_terminal(),
    ) {
        runner = runner.with_progress(Arc::new(progress::BarProgress::new()));
    }

    let request = RunRequest {
        start: args.start,
        end: args.end,
    };
    let report = match runner.run(request).await {
        Ok(report) => report,
        Err(e) if e.is_usage() => {
            error!("{e}");
            return Ok(ProcessExit::Usage);
        }
        Err(e) => return Err(e.into()),
    };

    match report.checkpoint_saved {
        Some(date) => info!(checkpoint = %date, "checkpoint updated"),
        None => debug!("checkpoint not updated"),
    }

    if report.stop_reason == StopReason::Interrupted {
        warn!(
            processed = report.stats.processed(),
            in_range = report.in_range,
            "Interrupted. Run again to resume."
        );
        return Ok(ProcessExit::Failure);
    }

    Ok(ProcessExit::Success)
}
