//! Serial link to the HID/ATX microcontroller
//!
//! Owns the open serial handle. Opens are requested by name fragment; the
//! first available port whose path contains the fragment wins. Writes are
//! blocking with a 1-second timeout and are sliced into chunks the board's
//! baud-limited inbox can absorb.

pub mod wire;

use crate::error::{KvmError, Result};
use serialport::SerialPort;
use std::io::Write;
use tracing::{debug, info};

/// Outcome of an open request, reported verbatim to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// First open of a link
    Opened,
    /// The requested device is already the open link
    AlreadyOpened,
    /// Same device as before, link had been closed in between
    Reopened,
    /// A different device; the previous link was closed and replaced
    Changed { previous: String },
}

impl OpenOutcome {
    /// Detail string for the status-code response
    pub fn detail(&self) -> String {
        match self {
            Self::Opened => "Opened".into(),
            Self::AlreadyOpened => "Already opened".into(),
            Self::Reopened => "Re-opened".into(),
            Self::Changed { previous } => {
                format!("Changed from \"{}\"", crate::protocol::clip(previous, 239))
            }
        }
    }
}

/// The one serial link of the server
///
/// The device name survives a `close()` so a later open of the same device
/// reports `Reopened` rather than `Opened`.
#[derive(Default)]
pub struct UartLink {
    port: Option<Box<dyn SerialPort>>,
    device: Option<String>,
}

impl UartLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Open the first available device whose path contains `fragment`
    pub fn open(&mut self, fragment: &str) -> Result<OpenOutcome> {
        let ports = serialport::available_ports().unwrap_or_default();
        let Some(target) = ports
            .into_iter()
            .map(|p| p.port_name)
            .find(|name| name.contains(fragment))
        else {
            return Err(KvmError::NoSerialDevice {
                fragment: fragment.to_string(),
            });
        };

        let outcome = match (&self.port, self.device.as_deref()) {
            (Some(_), Some(current)) if current == target => {
                return Ok(OpenOutcome::AlreadyOpened)
            }
            (None, Some(current)) if current == target => OpenOutcome::Reopened,
            (_, Some(current)) => OpenOutcome::Changed {
                previous: current.to_string(),
            },
            (_, None) => OpenOutcome::Opened,
        };

        // Replace the old link before touching the new device
        self.port = None;
        self.port = Some(open_port(&target)?);
        self.device = Some(target);
        Ok(outcome)
    }

    /// Close the link, keeping the device name for reopen detection
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed the opened serial device");
        }
    }

    /// Write a prebuilt frame sequence, sliced at the board's inbox limit
    ///
    /// A timeout surfaces as `ErrorKind::TimedOut` and leaves the link open;
    /// the caller reports it to the client without tearing anything down.
    pub fn write_frames(&mut self, data: &[u8]) -> std::io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        for chunk in data.chunks(wire::MAX_WRITE_CHUNK) {
            port.write_all(chunk)?;
        }
        debug!(bytes = data.len(), "Wrote command frames to serial");
        Ok(())
    }
}

fn open_port(device: &str) -> Result<Box<dyn SerialPort>> {
    serialport::new(device, wire::BAUD_RATE)
        .timeout(wire::WRITE_TIMEOUT)
        .open()
        .map_err(|e| KvmError::SerialOpen {
            device: device.to_string(),
            source: std::io::Error::other(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_outcome_details() {
        assert_eq!(OpenOutcome::Opened.detail(), "Opened");
        assert_eq!(OpenOutcome::AlreadyOpened.detail(), "Already opened");
        assert_eq!(OpenOutcome::Reopened.detail(), "Re-opened");
        assert_eq!(
            OpenOutcome::Changed {
                previous: "/dev/ttyUSB0".into()
            }
            .detail(),
            "Changed from \"/dev/ttyUSB0\""
        );
    }

    #[test]
    fn test_fresh_link_is_closed() {
        let link = UartLink::new();
        assert!(!link.is_open());
    }

    #[test]
    fn test_write_on_closed_link_is_not_connected() {
        let mut link = UartLink::new();
        let err = link.write_frames(&[0x0F, 0xE0]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_open_unmatched_fragment_reports_no_device() {
        let mut link = UartLink::new();
        // No host will enumerate a port containing this fragment
        let err = link.open("okvm-test-no-such-device").unwrap_err();
        assert!(matches!(err, KvmError::NoSerialDevice { .. }));
    }
}
