//! Client-facing wire protocol
//!
//! Every frame on the control channel starts with the 3-byte magic
//! `FF 31 D5` followed by a 1-byte type code. Multi-byte integers are
//! big-endian, names are UTF-8 with an explicit length prefix. There is no
//! checksum on this channel.
//!
//! This module owns the frame encoders and the parsed [`Request`] model;
//! the byte-stream side lives in [`parser`].

pub mod parser;

pub use parser::RequestParser;

use bytes::{BufMut, Bytes, BytesMut};

/// Frame prelude on the control channel
pub const MAGIC: [u8; 3] = [0xFF, 0x31, 0xD5];

// =============================================================================
// Type codes
// =============================================================================

pub const TYPE_HANDSHAKE: u8 = 0xFF;
pub const TYPE_GOODBYE: u8 = 0xEE;
pub const TYPE_ASK_ALIVE: u8 = 0xFD;
pub const TYPE_REPLY_ALIVE: u8 = 0x7D;
pub const TYPE_LIST_UART_REQ: u8 = 0x00;
pub const TYPE_LIST_CAP_REQ: u8 = 0x01;
pub const TYPE_RUN_MJPG_REQ: u8 = 0x10;
pub const TYPE_OPEN_UART_REQ: u8 = 0x20;
pub const TYPE_SEND_KEY_REQ: u8 = 0x21;
pub const TYPE_SEND_MOUSE_REQ: u8 = 0x22;
pub const TYPE_SEND_ATX_REQ: u8 = 0x23;
pub const TYPE_LIST_UART_RES: u8 = 0x80;
pub const TYPE_LIST_CAP_RES: u8 = 0x81;
pub const TYPE_RUN_MJPG_RES: u8 = 0x90;
pub const TYPE_OPEN_UART_RES: u8 = 0xA0;
pub const TYPE_SEND_KEY_RES: u8 = 0xA1;
pub const TYPE_SEND_MOUSE_RES: u8 = 0xA2;
pub const TYPE_SEND_ATX_RES: u8 = 0xA3;

// =============================================================================
// Body flags
// =============================================================================

pub const KEY_RELEASE: u8 = 0x00;
pub const KEY_PRESS: u8 = 0x01;
pub const KEY_CLEAR: u8 = 0x02;
pub const KEY_TEXT_SEND: u8 = 0x80;

pub const MOUSE_RELEASE: u8 = 0x00;
pub const MOUSE_PRESS: u8 = 0x01;
pub const MOUSE_CLEAR: u8 = 0x02;
pub const MOUSE_WHEEL_DOWN: u8 = 0x10;
pub const MOUSE_WHEEL_UP: u8 = 0x11;
pub const MOUSE_MOVE: u8 = 0x80;

pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_FAILURE: u8 = 0x01;

pub const ATX_SHORT_POWER: u8 = 0xFD;
pub const ATX_RESET: u8 = 0xFE;
pub const ATX_LONG_POWER: u8 = 0xFF;

// =============================================================================
// Device listings (wire-facing data model)
// =============================================================================

/// One entry of a list-uart response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartEntry {
    pub device: String,
    pub vid: u16,
    pub pid: u16,
}

/// One resolution of a capture device with the frame rates it supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMode {
    pub width: u16,
    pub height: u16,
    pub rates: Vec<u8>,
}

/// One entry of a list-cap response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEntry {
    pub device: String,
    pub modes: Vec<CaptureMode>,
}

// =============================================================================
// Parsed requests
// =============================================================================

/// Keyboard sub-command of a send-key request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    Press(u8),
    Release(u8),
    Clear,
    Text(Vec<u8>),
}

/// Mouse sub-command of a send-mouse request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseCommand {
    Press(u8),
    Release(u8),
    Clear,
    WheelUp,
    WheelDown,
    Move { dx: i8, dy: i8 },
}

/// A fully decoded inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Handshake,
    Goodbye,
    ReplyAlive,
    ListUart,
    ListCap,
    RunMjpg {
        capture: String,
        width: u16,
        height: u16,
        fps: u8,
        port: u16,
    },
    OpenUart {
        name: String,
    },
    SendKey(KeyCommand),
    SendMouse(MouseCommand),
    SendAtx {
        signal: u8,
    },
    /// Structurally invalid request; carries the response type to use and
    /// the protocol-error detail to report.
    Malformed {
        res_type: u8,
        detail: String,
    },
}

// =============================================================================
// Encoders
// =============================================================================

fn head(msg_type: u8, extra: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + extra);
    buf.put_slice(&MAGIC);
    buf.put_u8(msg_type);
    buf
}

/// 4-byte handshake frame (request and echo are identical)
pub fn handshake() -> Bytes {
    head(TYPE_HANDSHAKE, 0).freeze()
}

/// 4-byte goodbye frame
pub fn goodbye() -> Bytes {
    head(TYPE_GOODBYE, 0).freeze()
}

/// 4-byte liveness probe sent to the current peer
pub fn ask_alive() -> Bytes {
    head(TYPE_ASK_ALIVE, 0).freeze()
}

/// Generic status-code response: `code | detail-len | detail`
///
/// The detail is clamped to 255 bytes on a char boundary so it always fits
/// the 1-byte length field.
pub fn status(res_type: u8, code: u8, detail: &str) -> Bytes {
    let detail = clamp_utf8(detail, 255);
    let mut buf = head(res_type, 2 + detail.len());
    buf.put_u8(code);
    buf.put_u8(detail.len() as u8);
    buf.put_slice(detail.as_bytes());
    buf.freeze()
}

/// List-uart response: `count` then `len | name | vid | pid` per device
pub fn list_uart(devices: &[UartEntry]) -> Bytes {
    let mut buf = head(TYPE_LIST_UART_RES, 1);
    buf.put_u8(devices.len().min(255) as u8);
    for dev in devices.iter().take(255) {
        let name = clamp_utf8(&dev.device, 255);
        buf.put_u8(name.len() as u8);
        buf.put_slice(name.as_bytes());
        buf.put_u16(dev.vid);
        buf.put_u16(dev.pid);
    }
    buf.freeze()
}

/// List-cap response: `count` then per device `len | name | modes` where each
/// mode is `width | height | rate-count | rates`
pub fn list_captures(devices: &[CaptureEntry]) -> Bytes {
    let mut buf = head(TYPE_LIST_CAP_RES, 1);
    buf.put_u8(devices.len().min(255) as u8);
    for dev in devices.iter().take(255) {
        let name = clamp_utf8(&dev.device, 255);
        buf.put_u8(name.len() as u8);
        buf.put_slice(name.as_bytes());
        buf.put_u8(dev.modes.len().min(255) as u8);
        for mode in dev.modes.iter().take(255) {
            buf.put_u16(mode.width);
            buf.put_u16(mode.height);
            buf.put_u8(mode.rates.len().min(255) as u8);
            for &fps in mode.rates.iter().take(255) {
                buf.put_u8(fps);
            }
        }
    }
    buf.freeze()
}

/// Clip a client-supplied name to `max_chars` characters for response details
///
/// The caps (239/223/219/216 depending on the message) keep the surrounding
/// detail string within the 255-byte length field.
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence
fn clamp_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_frame_bytes() {
        assert_eq!(handshake().as_ref(), &[0xFF, 0x31, 0xD5, 0xFF]);
    }

    #[test]
    fn test_goodbye_frame_bytes() {
        assert_eq!(goodbye().as_ref(), &[0xFF, 0x31, 0xD5, 0xEE]);
    }

    #[test]
    fn test_ask_alive_frame_bytes() {
        assert_eq!(ask_alive().as_ref(), &[0xFF, 0x31, 0xD5, 0xFD]);
    }

    #[test]
    fn test_status_success_opened() {
        // Matches the open-uart success exchange byte for byte
        let frame = status(TYPE_OPEN_UART_RES, STATUS_SUCCESS, "Opened");
        assert_eq!(
            frame.as_ref(),
            &[0xFF, 0x31, 0xD5, 0xA0, 0x00, 0x06, b'O', b'p', b'e', b'n', b'e', b'd']
        );
    }

    #[test]
    fn test_status_empty_detail() {
        let frame = status(TYPE_SEND_KEY_RES, STATUS_FAILURE, "");
        assert_eq!(frame.as_ref(), &[0xFF, 0x31, 0xD5, 0xA1, 0x01, 0x00]);
    }

    #[test]
    fn test_status_detail_clamped_to_255_bytes() {
        let long = "x".repeat(300);
        let frame = status(TYPE_RUN_MJPG_RES, STATUS_FAILURE, &long);
        assert_eq!(frame[5], 255);
        assert_eq!(frame.len(), 4 + 2 + 255);
    }

    #[test]
    fn test_status_detail_clamp_respects_char_boundary() {
        // 'é' is two bytes; 128 of them straddle the 255-byte cap
        let long = "é".repeat(128);
        let frame = status(TYPE_RUN_MJPG_RES, STATUS_FAILURE, &long);
        assert_eq!(frame[5], 254);
        assert!(std::str::from_utf8(&frame[6..]).is_ok());
    }

    #[test]
    fn test_list_uart_empty() {
        let frame = list_uart(&[]);
        assert_eq!(frame.as_ref(), &[0xFF, 0x31, 0xD5, 0x80, 0x00]);
    }

    #[test]
    fn test_list_uart_single_device() {
        let frame = list_uart(&[UartEntry {
            device: "/dev/ttyUSB0".into(),
            vid: 0x0483,
            pid: 0xDF11,
        }]);
        let mut expect = vec![0xFF, 0x31, 0xD5, 0x80, 0x01, 12];
        expect.extend_from_slice(b"/dev/ttyUSB0");
        expect.extend_from_slice(&[0x04, 0x83, 0xDF, 0x11]);
        assert_eq!(frame.as_ref(), expect.as_slice());
    }

    #[test]
    fn test_list_captures_nested_layout() {
        let frame = list_captures(&[CaptureEntry {
            device: "/dev/video0".into(),
            modes: vec![
                CaptureMode {
                    width: 1920,
                    height: 1080,
                    rates: vec![30, 15],
                },
                CaptureMode {
                    width: 1280,
                    height: 960,
                    rates: vec![30],
                },
            ],
        }]);
        let mut expect = vec![0xFF, 0x31, 0xD5, 0x81, 0x01, 11];
        expect.extend_from_slice(b"/dev/video0");
        expect.push(2);
        expect.extend_from_slice(&[0x07, 0x80, 0x04, 0x38, 2, 30, 15]);
        expect.extend_from_slice(&[0x05, 0x00, 0x03, 0xC0, 1, 30]);
        assert_eq!(frame.as_ref(), expect.as_slice());
    }
}
