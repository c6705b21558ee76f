//! Host device enumeration
//!
//! Two capability surfaces for the client listings:
//! - serial ports, via the `serialport` crate (vid/pid render as 0 when the
//!   port is not USB-backed)
//! - V4L2 video captures, via thin shims over `v4l2-ctl` with the output
//!   parsing done here
//!
//! A device only counts as a capture when its "Device Caps" block reports
//! exactly `Video Capture`, and only its MJPG modes are listed.

use crate::error::{KvmError, Result};
use crate::protocol::{CaptureEntry, CaptureMode, UartEntry};
use serialport::SerialPortType;
use std::process::Command;
use tracing::{debug, warn};

/// All serial ports currently present on the host
pub fn list_uart_devices() -> Vec<UartEntry> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|port| {
            let (vid, pid) = match &port.port_type {
                SerialPortType::UsbPort(usb) => (usb.vid, usb.pid),
                _ => (0, 0),
            };
            UartEntry {
                device: port.port_name,
                vid,
                pid,
            }
        })
        .collect()
}

/// `/dev/video*` nodes that advertise the Video Capture capability
pub fn list_video_captures() -> Vec<String> {
    let mut nodes: Vec<String> = match std::fs::read_dir("/dev") {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| {
                name.strip_prefix("video")
                    .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            })
            .map(|name| format!("/dev/{}", name))
            .collect(),
        Err(_) => return Vec::new(),
    };
    nodes.sort();
    nodes.retain(|dev| match query_device_caps(dev) {
        Ok(is_capture) => is_capture,
        Err(_) => {
            debug!(device = %dev, "Dropping device that refused the caps query");
            false
        }
    });
    nodes
}

/// First capture whose path contains `fragment`
pub fn find_capture(fragment: &str) -> Option<String> {
    list_video_captures()
        .into_iter()
        .find(|dev| dev.contains(fragment))
}

/// Every capture with its MJPG resolutions and frame rates
///
/// A format query failure on any one device fails the whole enumeration;
/// the caller signals that to the client with an empty listing.
pub fn list_capture_devices() -> Result<Vec<CaptureEntry>> {
    let mut devices = Vec::new();
    for dev in list_video_captures() {
        let output = query_formats(&dev)?;
        let modes = parse_mjpg_modes(&output);
        devices.push(CaptureEntry { device: dev, modes });
    }
    Ok(devices)
}

// =============================================================================
// v4l2-ctl shims
// =============================================================================

fn query_device_caps(device: &str) -> Result<bool> {
    let output = run_v4l2_ctl(device, "--info")?;
    Ok(parse_device_caps(&output))
}

fn query_formats(device: &str) -> Result<String> {
    run_v4l2_ctl(device, "--list-formats-ext")
}

fn run_v4l2_ctl(device: &str, query: &str) -> Result<String> {
    let output = Command::new("v4l2-ctl")
        .args([query, "-d", device])
        .output()
        .map_err(|e| KvmError::CaptureQuery {
            device: device.to_string(),
            source: e,
        })?;
    if !output.status.success() {
        warn!(device = %device, query = %query, "v4l2-ctl reported failure");
        return Err(KvmError::CaptureQuery {
            device: device.to_string(),
            source: std::io::Error::other(format!("v4l2-ctl exited with {}", output.status)),
        });
    }
    String::from_utf8(output.stdout).map_err(|e| KvmError::CaptureQuery {
        device: device.to_string(),
        source: std::io::Error::other(e.to_string()),
    })
}

// =============================================================================
// Output parsing
// =============================================================================

/// True when the line after "Device Caps" is exactly `Video Capture`
fn parse_device_caps(output: &str) -> bool {
    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if line.contains("Device Caps") {
            return lines.next().map(str::trim) == Some("Video Capture");
        }
    }
    false
}

/// Extract `Size: Discrete WxH` / `Interval: ... (N fps)` pairs from the
/// MJPG section of a `--list-formats-ext` listing. Frame rates are rounded
/// to the nearest integer.
fn parse_mjpg_modes(output: &str) -> Vec<CaptureMode> {
    let mut modes: Vec<CaptureMode> = Vec::new();
    let mut in_mjpg = false;
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.split_once("]: ").map(|(_, rest)| rest) {
            // New pixel-format section, e.g. `'MJPG' (Motion-JPEG, compressed)`
            in_mjpg = rest.starts_with("'MJPG'");
            continue;
        }
        if !in_mjpg {
            continue;
        }
        if let Some(size) = line.strip_prefix("Size: Discrete ") {
            if let Some((w, h)) = parse_resolution(size) {
                modes.push(CaptureMode {
                    width: w,
                    height: h,
                    rates: Vec::new(),
                });
            }
        } else if line.starts_with("Interval: Discrete ") {
            if let (Some(mode), Some(fps)) = (modes.last_mut(), parse_fps(line)) {
                mode.rates.push(fps);
            }
        }
    }
    modes
}

fn parse_resolution(s: &str) -> Option<(u16, u16)> {
    let (w, h) = s.trim().split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// `Interval: Discrete 0.033s (30.000 fps)` -> 30
fn parse_fps(line: &str) -> Option<u8> {
    let inner = line.split_once('(')?.1.strip_suffix(" fps)")?;
    let value: f64 = inner.trim().parse().ok()?;
    if !(0.0..=255.0).contains(&value) {
        return None;
    }
    Some(value.round() as u8)
}
