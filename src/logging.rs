//! Logging setup
//!
//! Structured logging goes through `tracing`. The helpers at the bottom keep
//! call sites in platform code short.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialise the global subscriber.
///
/// # Arguments
/// * `log_level` - filter directive (trace, debug, info, warn, error). When `None`,
///   `RUST_LOG` is consulted, then `REPEAT_VIEWER_DEBUG`, then the built-in default.
/// * `log_file` - optional file that receives a plain-text copy of every event.
///
/// # Examples
/// ```no_run
/// use repeat_viewer::logging::init_logger;
///
/// init_logger(None, None).unwrap();
/// init_logger(Some("debug"), None).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = if let Some(level) = log_level {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if crate::config::debug_enabled() {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info,repeat_viewer=debug")
            }
        })
    };

    // Progress output owns stdout, so log lines go to stderr.
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(true)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing::debug!("Logger initialized");
    Ok(())
}

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!("{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}
