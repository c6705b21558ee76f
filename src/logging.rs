//! Tracing initialization
//!
//! The CLI exposes the numeric levels of the original protocol family
//! (0=FATAL .. 5=TRACE); tracing has no FATAL, so 0 and 1 both land on
//! ERROR. Without a logfile, ERROR-and-above goes to stderr and everything
//! else to stdout; with one, all output is appended to the file with ANSI
//! disabled.

use crate::error::{KvmError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Map the CLI's 0..5 onto a tracing filter directive
pub fn level_directive(level: u8) -> &'static str {
    match level {
        0 | 1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber
///
/// Call early in main() before any logging occurs.
pub fn init(level: u8, logfile: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::new(level_directive(level));

    match logfile {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| KvmError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init();
        }
        None => {
            let writer = std::io::stderr
                .with_max_level(Level::ERROR)
                .or_else(std::io::stdout);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(writer)
                .try_init();
        }
    }
    Ok(())
}
