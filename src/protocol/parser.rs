//! Streaming request parser
//!
//! The control channel is not self-delimiting: request length depends on the
//! type byte and, for some types, on flag and length fields inside the body.
//! The parser accumulates socket bytes in a rolling buffer and yields one
//! decoded [`Request`] at a time:
//!
//! - stray bytes before the next magic are discarded (resynchronization)
//! - a request whose body has not fully arrived consumes nothing and is
//!   retried on the next feed
//! - unknown type codes are skipped without a response
//! - structurally invalid bodies surface as [`Request::Malformed`] so the
//!   dispatcher can answer with a protocol-error status

use super::*;
use bytes::Buf;

/// Parser state for the inbound byte stream
#[derive(Default)]
pub struct RequestParser {
    buf: BytesMut,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// Append freshly received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Admission gate: does the stream open with the 4-byte handshake frame?
    ///
    /// Returns `None` until four bytes have arrived.
    pub fn handshake_opening(&self) -> Option<bool> {
        if self.buf.len() < 4 {
            return None;
        }
        Some(self.buf[..3] == MAGIC && self.buf[3] == TYPE_HANDSHAKE)
    }

    /// Extract the next complete request, or `None` if more bytes are needed
    pub fn next_request(&mut self) -> Option<Request> {
        loop {
            let Some(pos) = find_magic(&self.buf) else {
                // No magic anywhere: drop everything except a trailing
                // partial magic so a frame split mid-prelude still parses.
                let keep = partial_magic_len(&self.buf);
                let drop = self.buf.len() - keep;
                self.buf.advance(drop);
                return None;
            };
            if pos > 0 {
                self.buf.advance(pos);
            }
            if self.buf.len() < 4 {
                return None;
            }
            match self.buf[3] {
                TYPE_HANDSHAKE => return self.fixed(0, Request::Handshake),
                TYPE_GOODBYE => return self.fixed(0, Request::Goodbye),
                TYPE_REPLY_ALIVE => return self.fixed(0, Request::ReplyAlive),
                TYPE_LIST_UART_REQ => return self.fixed(0, Request::ListUart),
                TYPE_LIST_CAP_REQ => return self.fixed(0, Request::ListCap),
                TYPE_RUN_MJPG_REQ => return self.parse_run_mjpg(),
                TYPE_OPEN_UART_REQ => return self.parse_open_uart(),
                TYPE_SEND_KEY_REQ => return self.parse_send_key(),
                TYPE_SEND_MOUSE_REQ => return self.parse_send_mouse(),
                TYPE_SEND_ATX_REQ => {
                    if self.buf.len() < 5 {
                        return None;
                    }
                    let signal = self.buf[4];
                    self.buf.advance(5);
                    return Some(Request::SendAtx { signal });
                }
                // Unknown type: skip the prelude and keep scanning. The
                // client observes silence, which signals desynchronization.
                _ => {
                    self.buf.advance(4);
                }
            }
        }
    }

    /// Consume the 4-byte prelude plus `body` bytes and yield `req`
    fn fixed(&mut self, body: usize, req: Request) -> Option<Request> {
        if self.buf.len() < 4 + body {
            return None;
        }
        self.buf.advance(4 + body);
        Some(req)
    }

    /// Body: `1B len | len B name | 2B width | 2B height | 1B fps | 2B port`
    fn parse_run_mjpg(&mut self) -> Option<Request> {
        let name = match self.parse_name(TYPE_RUN_MJPG_RES, "Video capture") {
            NameField::Incomplete => return None,
            NameField::Bad(req) => return Some(req),
            NameField::Ok(name) => name,
        };
        let n = name.len();
        if self.buf.len() < 5 + n + 7 {
            return None;
        }
        let b = &self.buf;
        let width = u16::from_be_bytes([b[5 + n], b[6 + n]]);
        let height = u16::from_be_bytes([b[7 + n], b[8 + n]]);
        let fps = b[9 + n];
        let port = u16::from_be_bytes([b[10 + n], b[11 + n]]);
        self.buf.advance(5 + n + 7);
        Some(Request::RunMjpg {
            capture: name,
            width,
            height,
            fps,
            port,
        })
    }

    /// Body: `1B len | len B name`
    fn parse_open_uart(&mut self) -> Option<Request> {
        match self.parse_name(TYPE_OPEN_UART_RES, "Serial device") {
            NameField::Incomplete => None,
            NameField::Bad(req) => Some(req),
            NameField::Ok(name) => {
                let n = name.len();
                self.buf.advance(5 + n);
                Some(Request::OpenUart { name })
            }
        }
    }

    /// Length-prefixed UTF-8 name at offset 4. On success the name is
    /// returned but NOT consumed (callers may need trailing fields first);
    /// malformed names are consumed through their last byte.
    fn parse_name(&mut self, res_type: u8, what: &str) -> NameField {
        if self.buf.len() < 5 {
            return NameField::Incomplete;
        }
        let n = self.buf[4] as usize;
        if n == 0 {
            self.buf.advance(5);
            return NameField::Bad(Request::Malformed {
                res_type,
                detail: format!("Protocol Error: {} name length is 0", what),
            });
        }
        if self.buf.len() < 5 + n {
            return NameField::Incomplete;
        }
        match std::str::from_utf8(&self.buf[5..5 + n]) {
            Ok(name) => NameField::Ok(name.to_string()),
            Err(_) => {
                self.buf.advance(5 + n);
                NameField::Bad(Request::Malformed {
                    res_type,
                    detail: format!("Protocol Error: {} name is not valid UTF-8 encoding", what),
                })
            }
        }
    }

    /// Body: flag, then per-flag payload (see the send-key contract)
    fn parse_send_key(&mut self) -> Option<Request> {
        if self.buf.len() < 5 {
            return None;
        }
        match self.buf[4] {
            KEY_CLEAR => self.fixed(1, Request::SendKey(KeyCommand::Clear)),
            flag @ (KEY_PRESS | KEY_RELEASE) => {
                if self.buf.len() < 6 {
                    return None;
                }
                let key = self.buf[5];
                self.buf.advance(6);
                Some(Request::SendKey(if flag == KEY_PRESS {
                    KeyCommand::Press(key)
                } else {
                    KeyCommand::Release(key)
                }))
            }
            KEY_TEXT_SEND => {
                if self.buf.len() < 7 {
                    return None;
                }
                let len = u16::from_be_bytes([self.buf[5], self.buf[6]]) as usize;
                if len == 0 {
                    self.buf.advance(7);
                    return Some(Request::Malformed {
                        res_type: TYPE_SEND_KEY_RES,
                        detail: "Protocol Error: the flag KEY_TEXT_SEND followed zero commands length"
                            .into(),
                    });
                }
                if self.buf.len() < 7 + len {
                    return None;
                }
                let text = self.buf[7..7 + len].to_vec();
                self.buf.advance(7 + len);
                Some(Request::SendKey(KeyCommand::Text(text)))
            }
            flag => {
                self.buf.advance(5);
                Some(invalid_flag(TYPE_SEND_KEY_RES, flag))
            }
        }
    }

    /// Body: flag, then per-flag payload (see the send-mouse contract)
    fn parse_send_mouse(&mut self) -> Option<Request> {
        if self.buf.len() < 5 {
            return None;
        }
        match self.buf[4] {
            MOUSE_CLEAR => self.fixed(1, Request::SendMouse(MouseCommand::Clear)),
            MOUSE_WHEEL_UP => self.fixed(1, Request::SendMouse(MouseCommand::WheelUp)),
            MOUSE_WHEEL_DOWN => self.fixed(1, Request::SendMouse(MouseCommand::WheelDown)),
            flag @ (MOUSE_PRESS | MOUSE_RELEASE) => {
                if self.buf.len() < 6 {
                    return None;
                }
                let button = self.buf[5];
                self.buf.advance(6);
                Some(Request::SendMouse(if flag == MOUSE_PRESS {
                    MouseCommand::Press(button)
                } else {
                    MouseCommand::Release(button)
                }))
            }
            MOUSE_MOVE => {
                if self.buf.len() < 7 {
                    return None;
                }
                let dx = self.buf[5] as i8;
                let dy = self.buf[6] as i8;
                self.buf.advance(7);
                Some(Request::SendMouse(MouseCommand::Move { dx, dy }))
            }
            flag => {
                self.buf.advance(5);
                Some(invalid_flag(TYPE_SEND_MOUSE_RES, flag))
            }
        }
    }
}

enum NameField {
    Incomplete,
    Ok(String),
    Bad(Request),
}

fn invalid_flag(res_type: u8, flag: u8) -> Request {
    Request::Malformed {
        res_type,
        detail: format!("Protocol Error: Received flag <{:02X}> is invalid", flag),
    }
}

fn find_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(MAGIC.len()).position(|w| w == MAGIC)
}

/// Length of the longest buffer suffix that is a proper prefix of the magic
fn partial_magic_len(buf: &[u8]) -> usize {
    for keep in (1..MAGIC.len()).rev() {
        if buf.len() >= keep && buf[buf.len() - keep..] == MAGIC[..keep] {
            return keep;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse_all(data: &[u8]) -> Vec<Request> {
        let mut parser = RequestParser::new();
        parser.feed(data);
        let mut out = Vec::new();
        while let Some(req) = parser.next_request() {
            out.push(req);
        }
        out
    }

    #[test]
    fn test_parse_handshake() {
        assert_eq!(parse_all(&[0xFF, 0x31, 0xD5, 0xFF]), vec![Request::Handshake]);
    }

    #[test]
    fn test_parse_open_uart_literal() {
        // Open serial "ttyUSB0"
        let data = [
            0xFF, 0x31, 0xD5, 0x20, 0x07, 0x74, 0x74, 0x79, 0x55, 0x53, 0x42, 0x30,
        ];
        assert_eq!(
            parse_all(&data),
            vec![Request::OpenUart {
                name: "ttyUSB0".into()
            }]
        );
    }

    #[test]
    fn test_parse_key_press_literal() {
        assert_eq!(
            parse_all(&[0xFF, 0x31, 0xD5, 0x21, 0x01, 0x41]),
            vec![Request::SendKey(KeyCommand::Press(0x41))]
        );
    }

    #[test]
    fn test_parse_mouse_move_signed() {
        // (-5, +10) as two's complement bytes
        assert_eq!(
            parse_all(&[0xFF, 0x31, 0xD5, 0x22, 0x80, 0xFB, 0x0A]),
            vec![Request::SendMouse(MouseCommand::Move { dx: -5, dy: 10 })]
        );
    }

    #[test]
    fn test_parse_mouse_move_extremes() {
        assert_eq!(
            parse_all(&[0xFF, 0x31, 0xD5, 0x22, 0x80, 0x80, 0x7F]),
            vec![Request::SendMouse(MouseCommand::Move { dx: -128, dy: 127 })]
        );
    }

    #[test]
    fn test_parse_atx_literal() {
        assert_eq!(
            parse_all(&[0xFF, 0x31, 0xD5, 0x23, 0xFD]),
            vec![Request::SendAtx { signal: 0xFD }]
        );
    }

    #[test]
    fn test_parse_run_mjpg() {
        let mut data = vec![0xFF, 0x31, 0xD5, 0x10, 11];
        data.extend_from_slice(b"/dev/video0");
        data.extend_from_slice(&[0x07, 0x80, 0x04, 0x38, 30, 0x1F, 0x90]);
        assert_eq!(
            parse_all(&data),
            vec![Request::RunMjpg {
                capture: "/dev/video0".into(),
                width: 1920,
                height: 1080,
                fps: 30,
                port: 8080,
            }]
        );
    }

    #[test]
    fn test_parse_byte_at_a_time() {
        let mut data = vec![0xFF, 0x31, 0xD5, 0x21, 0x80, 0x00, 0x02, b'h', b'i'];
        data.extend_from_slice(&[0xFF, 0x31, 0xD5, 0x22, 0x11]);
        let mut parser = RequestParser::new();
        let mut out = Vec::new();
        for byte in data {
            parser.feed(&[byte]);
            while let Some(req) = parser.next_request() {
                out.push(req);
            }
        }
        assert_eq!(
            out,
            vec![
                Request::SendKey(KeyCommand::Text(b"hi".to_vec())),
                Request::SendMouse(MouseCommand::WheelUp),
            ]
        );
    }

    #[test]
    fn test_stray_bytes_before_magic_discarded() {
        let data = [0x00, 0xAB, 0xFF, 0x31, 0xD5, 0xFF];
        assert_eq!(parse_all(&data), vec![Request::Handshake]);
    }

    #[test]
    fn test_partial_magic_survives_flush() {
        let mut parser = RequestParser::new();
        parser.feed(&[0x42, 0x42, 0xFF, 0x31]);
        assert!(parser.next_request().is_none());
        parser.feed(&[0xD5, 0xEE]);
        assert_eq!(parser.next_request(), Some(Request::Goodbye));
    }

    #[test]
    fn test_garbage_without_magic_discarded() {
        let mut parser = RequestParser::new();
        parser.feed(&[1, 2, 3, 4, 5]);
        assert!(parser.next_request().is_none());
        parser.feed(&[0xFF, 0x31, 0xD5, 0x00]);
        assert_eq!(parser.next_request(), Some(Request::ListUart));
    }

    #[test]
    fn test_unknown_type_skipped_silently() {
        let data = [0xFF, 0x31, 0xD5, 0x42, 0xFF, 0x31, 0xD5, 0x01];
        assert_eq!(parse_all(&data), vec![Request::ListCap]);
    }

    #[test]
    fn test_zero_name_length_rejected() {
        let out = parse_all(&[0xFF, 0x31, 0xD5, 0x20, 0x00]);
        assert_eq!(
            out,
            vec![Request::Malformed {
                res_type: TYPE_OPEN_UART_RES,
                detail: "Protocol Error: Serial device name length is 0".into(),
            }]
        );
    }

    #[test]
    fn test_zero_text_length_rejected() {
        let out = parse_all(&[0xFF, 0x31, 0xD5, 0x21, 0x80, 0x00, 0x00]);
        assert_eq!(
            out,
            vec![Request::Malformed {
                res_type: TYPE_SEND_KEY_RES,
                detail: "Protocol Error: the flag KEY_TEXT_SEND followed zero commands length"
                    .into(),
            }]
        );
    }

    #[test]
    fn test_non_utf8_name_rejected() {
        let out = parse_all(&[0xFF, 0x31, 0xD5, 0x20, 0x02, 0xFF, 0xFE]);
        assert_eq!(
            out,
            vec![Request::Malformed {
                res_type: TYPE_OPEN_UART_RES,
                detail: "Protocol Error: Serial device name is not valid UTF-8 encoding".into(),
            }]
        );
    }

    #[test]
    fn test_invalid_key_flag_rejected() {
        let out = parse_all(&[0xFF, 0x31, 0xD5, 0x21, 0x42]);
        assert_eq!(
            out,
            vec![Request::Malformed {
                res_type: TYPE_SEND_KEY_RES,
                detail: "Protocol Error: Received flag <42> is invalid".into(),
            }]
        );
    }

    #[test]
    fn test_invalid_mouse_flag_rejected() {
        let out = parse_all(&[0xFF, 0x31, 0xD5, 0x22, 0x03]);
        assert_eq!(
            out,
            vec![Request::Malformed {
                res_type: TYPE_SEND_MOUSE_RES,
                detail: "Protocol Error: Received flag <03> is invalid".into(),
            }]
        );
    }

    #[test]
    fn test_pipelined_requests_drain_in_order() {
        let mut data = vec![0xFF, 0x31, 0xD5, 0x00];
        data.extend_from_slice(&[0xFF, 0x31, 0xD5, 0x01]);
        data.extend_from_slice(&[0xFF, 0x31, 0xD5, 0x21, 0x02]);
        assert_eq!(
            parse_all(&data),
            vec![
                Request::ListUart,
                Request::ListCap,
                Request::SendKey(KeyCommand::Clear),
            ]
        );
    }

    #[test]
    fn test_handshake_opening_gate() {
        let mut parser = RequestParser::new();
        parser.feed(&[0xFF, 0x31]);
        assert_eq!(parser.handshake_opening(), None);
        parser.feed(&[0xD5, 0xFF]);
        assert_eq!(parser.handshake_opening(), Some(true));

        let mut bad = RequestParser::new();
        bad.feed(b"GET / HTTP/1.1");
        assert_eq!(bad.handshake_opening(), Some(false));
    }

    // =========================================================================
    // Round-trip properties
    // =========================================================================

    /// Client-side encoding of a request, mirroring the frame layouts in the
    /// module docs; the property checks P(E(x)) = x.
    fn encode_request(req: &Request) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        match req {
            Request::Handshake => out.push(TYPE_HANDSHAKE),
            Request::Goodbye => out.push(TYPE_GOODBYE),
            Request::ReplyAlive => out.push(TYPE_REPLY_ALIVE),
            Request::ListUart => out.push(TYPE_LIST_UART_REQ),
            Request::ListCap => out.push(TYPE_LIST_CAP_REQ),
            Request::RunMjpg {
                capture,
                width,
                height,
                fps,
                port,
            } => {
                out.push(TYPE_RUN_MJPG_REQ);
                out.push(capture.len() as u8);
                out.extend_from_slice(capture.as_bytes());
                out.extend_from_slice(&width.to_be_bytes());
                out.extend_from_slice(&height.to_be_bytes());
                out.push(*fps);
                out.extend_from_slice(&port.to_be_bytes());
            }
            Request::OpenUart { name } => {
                out.push(TYPE_OPEN_UART_REQ);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Request::SendKey(cmd) => {
                out.push(TYPE_SEND_KEY_REQ);
                match cmd {
                    KeyCommand::Press(key) => out.extend_from_slice(&[KEY_PRESS, *key]),
                    KeyCommand::Release(key) => out.extend_from_slice(&[KEY_RELEASE, *key]),
                    KeyCommand::Clear => out.push(KEY_CLEAR),
                    KeyCommand::Text(text) => {
                        out.push(KEY_TEXT_SEND);
                        out.extend_from_slice(&(text.len() as u16).to_be_bytes());
                        out.extend_from_slice(text);
                    }
                }
            }
            Request::SendMouse(cmd) => {
                out.push(TYPE_SEND_MOUSE_REQ);
                match cmd {
                    MouseCommand::Press(b) => out.extend_from_slice(&[MOUSE_PRESS, *b]),
                    MouseCommand::Release(b) => out.extend_from_slice(&[MOUSE_RELEASE, *b]),
                    MouseCommand::Clear => out.push(MOUSE_CLEAR),
                    MouseCommand::WheelUp => out.push(MOUSE_WHEEL_UP),
                    MouseCommand::WheelDown => out.push(MOUSE_WHEEL_DOWN),
                    MouseCommand::Move { dx, dy } => {
                        out.extend_from_slice(&[MOUSE_MOVE, *dx as u8, *dy as u8])
                    }
                }
            }
            Request::SendAtx { signal } => out.extend_from_slice(&[TYPE_SEND_ATX_REQ, *signal]),
            Request::Malformed { .. } => unreachable!("not encodable"),
        }
        out
    }

    fn arb_name() -> impl Strategy<Value = String> {
        // NUL is explicitly in the mix; 40 chars of up-to-4-byte UTF-8 stay
        // well under the 255-byte length field
        proptest::collection::vec(prop_oneof![Just('\0'), any::<char>()], 1..40)
            .prop_map(|chars| chars.into_iter().collect())
    }

    fn arb_request() -> impl Strategy<Value = Request> {
        prop_oneof![
            Just(Request::Handshake),
            Just(Request::Goodbye),
            Just(Request::ReplyAlive),
            Just(Request::ListUart),
            Just(Request::ListCap),
            (arb_name(), any::<u16>(), any::<u16>(), any::<u8>(), any::<u16>()).prop_map(
                |(capture, width, height, fps, port)| Request::RunMjpg {
                    capture,
                    width,
                    height,
                    fps,
                    port,
                }
            ),
            arb_name().prop_map(|name| Request::OpenUart { name }),
            any::<u8>().prop_map(|k| Request::SendKey(KeyCommand::Press(k))),
            any::<u8>().prop_map(|k| Request::SendKey(KeyCommand::Release(k))),
            Just(Request::SendKey(KeyCommand::Clear)),
            proptest::collection::vec(any::<u8>(), 1..200)
                .prop_map(|t| Request::SendKey(KeyCommand::Text(t))),
            any::<u8>().prop_map(|b| Request::SendMouse(MouseCommand::Press(b))),
            any::<u8>().prop_map(|b| Request::SendMouse(MouseCommand::Release(b))),
            Just(Request::SendMouse(MouseCommand::Clear)),
            Just(Request::SendMouse(MouseCommand::WheelUp)),
            Just(Request::SendMouse(MouseCommand::WheelDown)),
            (any::<i8>(), any::<i8>())
                .prop_map(|(dx, dy)| Request::SendMouse(MouseCommand::Move { dx, dy })),
            any::<u8>().prop_map(|signal| Request::SendAtx { signal }),
        ]
    }

    proptest! {
        #[test]
        fn prop_request_round_trip(req in arb_request()) {
            let encoded = encode_request(&req);
            prop_assert_eq!(parse_all(&encoded), vec![req]);
        }

        #[test]
        fn prop_request_sequence_round_trip(reqs in proptest::collection::vec(arb_request(), 1..8)) {
            let mut stream = Vec::new();
            for req in &reqs {
                stream.extend_from_slice(&encode_request(req));
            }
            prop_assert_eq!(parse_all(&stream), reqs);
        }

        #[test]
        fn prop_split_feed_equals_single_feed(req in arb_request(), split in 0usize..32) {
            let encoded = encode_request(&req);
            let cut = split.min(encoded.len());
            let mut parser = RequestParser::new();
            parser.feed(&encoded[..cut]);
            let mut out = Vec::new();
            while let Some(r) = parser.next_request() {
                out.push(r);
            }
            parser.feed(&encoded[cut..]);
            while let Some(r) = parser.next_request() {
                out.push(r);
            }
            prop_assert_eq!(out, vec![req]);
        }
    }
}
