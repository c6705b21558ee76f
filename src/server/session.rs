//! Client session slot
//!
//! At most one peer occupies the slot. A freshly accepted socket holds it
//! unaccepted until the handshake frame arrives; only then do request
//! handlers run on its behalf. The slot owns the rolling request parser and
//! the pending outbound bytes for that peer.

use crate::protocol::RequestParser;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;

/// The one connected peer
pub struct Session {
    stream: TcpStream,
    peer: String,
    /// True only after a successful handshake
    pub accepted: bool,
    pub parser: RequestParser,
    outbound: BytesMut,
    last_activity: Instant,
}

impl Session {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            peer: format_peer(addr),
            accepted: false,
            parser: RequestParser::new(),
            outbound: BytesMut::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Display form of the peer address (v4-mapped shown as IPv4)
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Record peer activity for the idle timeout
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    pub fn queue(&mut self, frame: Bytes) {
        self.outbound.extend_from_slice(&frame);
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Drain everything queued so far for a one-shot send
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }
}

/// Render a peer address, stripping the `::ffff:` prefix of v4-mapped peers
pub fn format_peer(addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V4(v4) => v4.to_string(),
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => format!("{}:{}", v4, v6.port()),
            None => format!("[{}]:{}", v6.ip(), v6.port()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_peer_strips_v4_mapped_prefix() {
        let addr: SocketAddr = "[::ffff:192.0.2.7]:4242".parse().unwrap();
        assert_eq!(format_peer(addr), "192.0.2.7:4242");
    }

    #[test]
    fn test_format_peer_brackets_native_v6() {
        let addr: SocketAddr = "[::1]:4242".parse().unwrap();
        assert_eq!(format_peer(addr), "[::1]:4242");
    }

    #[test]
    fn test_format_peer_plain_v4() {
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        assert_eq!(format_peer(addr), "127.0.0.1:80");
    }
}
