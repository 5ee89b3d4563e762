//! Logging bootstrap for host applications.
//!
//! The library only emits `tracing` events. Hosts call one of these once at
//! startup to install a subscriber; a second call is a no-op.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log file name used by [`init_file_logging`].
pub const LOG_FILE_NAME: &str = "pin-center.log";

/// Returns the default filter directive for the verbosity.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "pin_center=debug"
    } else {
        "pin_center=info"
    }
}

/// Installs a stderr subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init();
}

/// Installs a subscriber writing to a daily-rotated file in `log_dir`.
///
/// The returned guard flushes buffered events on drop and must be kept
/// alive for as long as logging is needed.
pub fn init_file_logging(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    // Use try_init to avoid panic if a subscriber is already set
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(file_layer)
        .try_init();

    Ok(guard)
}
