//! Centralized error types for the server
//!
//! All server errors are represented by the `KvmError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, KvmError>`.

use std::fmt;
use std::path::PathBuf;

/// All server errors
#[derive(Debug)]
pub enum KvmError {
    // === Network ===
    /// Failed to bind the listening socket
    Bind {
        addr: String,
        source: std::io::Error,
    },

    // === Serial ===
    /// Failed to open a serial device
    SerialOpen {
        device: String,
        source: std::io::Error,
    },
    /// No serial device matched the requested name fragment
    NoSerialDevice { fragment: String },

    // === Capture ===
    /// Shelling out to the V4L2 query tool failed
    CaptureQuery {
        device: String,
        source: std::io::Error,
    },

    // === Config ===
    /// Failed to read/write a config or log file
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },
}

impl std::error::Error for KvmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. }
            | Self::SerialOpen { source, .. }
            | Self::CaptureQuery { source, .. }
            | Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for KvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, .. } => write!(f, "Cannot bind listening socket on {}", addr),
            Self::SerialOpen { device, .. } => write!(f, "Cannot open serial device {}", device),
            Self::NoSerialDevice { fragment } => {
                write!(f, "No serial device matching \"{}\"", fragment)
            }
            Self::CaptureQuery { device, .. } => {
                write!(f, "Cannot query video capture {}", device)
            }
            Self::Io { path, .. } => write!(f, "I/O error on {}", path.display()),
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
        }
    }
}

/// Alias for Result with KvmError
pub type Result<T> = std::result::Result<T, KvmError>;
