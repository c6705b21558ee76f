//! Microcontroller command frames
//!
//! Wire format: `magic | command | size | body | checksum` with the 2-byte
//! magic `0F E0`. The size byte counts the body plus the trailing checksum,
//! and the checksum is the XOR of every preceding byte including the magic.
//!
//! The board's serial inbox is baud-limited; senders must respect
//! [`MAX_WRITE_CHUNK`] per write (enforced in [`super::UartLink`]).

/// Must match the board's configured baud; opening at any other rate makes
/// the hardware reboot and latches the ATX front-panel lines high.
pub const BAUD_RATE: u32 = 19_200;

const WRITE_TIMEOUT_SECS: u64 = 1;

/// Per-write timeout on the serial handle
pub const WRITE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(WRITE_TIMEOUT_SECS);

/// Largest burst one write may carry: baud * timeout / 10 bits-per-byte
pub const MAX_WRITE_CHUNK: usize = BAUD_RATE as usize * WRITE_TIMEOUT_SECS as usize / 10;

/// Frame prelude on the serial line
pub const SERIAL_MAGIC: [u8; 2] = [0x0F, 0xE0];

pub const CMD_KEY_CLICK: u8 = 0x10;
pub const CMD_TEXT_ENTER: u8 = 0x11;
pub const CMD_KEY_CLEAR: u8 = 0x12;
pub const CMD_MOUSE_CLICK: u8 = 0x20;
pub const CMD_MOUSE_MOVE: u8 = 0x21;
pub const CMD_MOUSE_WHEEL: u8 = 0x22;
pub const CMD_MOUSE_CLEAR: u8 = 0x23;
pub const CMD_SHORT_POWER: u8 = 0x31;
pub const CMD_RESET: u8 = 0x32;
pub const CMD_LONG_POWER: u8 = 0x33;

/// Arduino-side mouse button codes
pub const MOUSE_LEFT: u8 = 1;
pub const MOUSE_RIGHT: u8 = 2;
pub const MOUSE_MIDDLE: u8 = 4;

/// XOR of all bytes
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

fn frame(cmd: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len() + 1);
    out.extend_from_slice(&SERIAL_MAGIC);
    out.push(cmd);
    out.push(body.len() as u8 + 1);
    out.extend_from_slice(body);
    out.push(checksum(&out));
    out
}

/// Key press/release: body `act | key` where act 01 = press, 00 = release
pub fn key_click(press: bool, key: u8) -> Vec<u8> {
    frame(CMD_KEY_CLICK, &[press as u8, key])
}

/// Enter one printable (or Tab/LF) character
pub fn text_enter(ch: u8) -> Vec<u8> {
    frame(CMD_TEXT_ENTER, &[ch])
}

/// One text-enter frame per character, concatenated for a single burst
pub fn text_burst(chars: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chars.len() * 6);
    for &ch in chars {
        out.extend_from_slice(&text_enter(ch));
    }
    out
}

/// Release every pressed key
pub fn key_clear() -> Vec<u8> {
    frame(CMD_KEY_CLEAR, &[])
}

/// Mouse button press/release
pub fn mouse_click(press: bool, button: u8) -> Vec<u8> {
    frame(CMD_MOUSE_CLICK, &[press as u8, button])
}

/// Relative cursor move; displacements are signed 8-bit
pub fn mouse_move(dx: i8, dy: i8) -> Vec<u8> {
    frame(CMD_MOUSE_MOVE, &[dx as u8, dy as u8])
}

/// Scroll wheel: orient 01 = up, 00 = down
pub fn mouse_wheel(up: bool) -> Vec<u8> {
    frame(CMD_MOUSE_WHEEL, &[up as u8])
}

/// Release every pressed mouse button
pub fn mouse_clear() -> Vec<u8> {
    frame(CMD_MOUSE_CLEAR, &[])
}

/// ATX front-panel signal; maps the client signal bytes FD/FE/FF onto the
/// board commands 31/32/33. `None` for anything else.
pub fn atx(signal: u8) -> Option<Vec<u8>> {
    use crate::protocol::{ATX_LONG_POWER, ATX_RESET, ATX_SHORT_POWER};
    let cmd = match signal {
        ATX_SHORT_POWER => CMD_SHORT_POWER,
        ATX_RESET => CMD_RESET,
        ATX_LONG_POWER => CMD_LONG_POWER,
        _ => return None,
    };
    Some(frame(cmd, &[]))
}
