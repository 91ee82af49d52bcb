//! Logging context built once at program entry.
//!
//! Three sinks: a stderr layer filtered by the CLI verbosity flags, plus two
//! append files under the log dir - `lc_info.log` (INFO and up) and
//! `lc_error.log` (WARN and up). Nothing here is a mutable module-level
//! singleton; init happens exactly once and components only emit `tracing`
//! events. Critical run summaries are printed to stdout by the callers and
//! never pass through these filters.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn from_flags(quiet: bool, verbose: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    fn console_level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::WARN,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Verbose => LevelFilter::DEBUG,
            Verbosity::Debug => LevelFilter::TRACE,
        }
    }
}

/// Default log dir when the CLI and the launch config both leave it unset.
pub fn default_log_dir() -> PathBuf {
    home::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".launchcontainers")
        .join("logs")
}

/// Install the subscriber. Safe to call once per process; later calls are
/// no-ops (tests initialize through the binary repeatedly).
pub fn init_logging(verbosity: Verbosity, log_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let info_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("lc_info.log"))?;
    let error_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("lc_error.log"))?;

    // RUST_LOG wins over the flag-derived level when set.
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.console_level().to_string()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(info_file))
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(error_file))
                .with_filter(LevelFilter::WARN),
        )
        .try_init();
    Ok(())
}
