//! Session loop and admission control
//!
//! One loop task multiplexes the listener, the single client socket, and a
//! loop-event channel fed by deferred tasks (the ask-alive waiter and the
//! MJPG supervisor). All parsing, dispatching and serial writes happen on
//! this task; deferred tasks only perform timed waits and subprocess I/O and
//! hand frames back through the channel.
//!
//! Admission: the first TCP peer takes the slot but stays unaccepted until
//! its opening four bytes are the handshake frame. A second TCP peer while a
//! session is accepted triggers the ask-alive probe; the stale peer is
//! displaced only when the probe times out.

pub mod session;

use crate::capture;
use crate::cli::Settings;
use crate::constants::{
    ASK_ALIVE_POLL, ASK_ALIVE_TIMEOUT, MAX_TEXT_PREVIEW, RECV_BUFFER_SIZE, SELECT_TIMEOUT,
    SEND_RETRY_DELAY, SOCK_TIMEOUT, TIMEOUT_RT,
};
use crate::error::{KvmError, Result};
use crate::mjpg::{EnsureOutcome, MjpgSupervisor, StreamConfig};
use crate::protocol::{self, KeyCommand, MouseCommand, Request};
use crate::signal::{ShutdownFlag, TermCause};
use crate::uart::{wire, UartLink};
use bytes::Bytes;
use session::Session;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace, warn};

/// Results handed back to the loop by deferred tasks
enum LoopEvent {
    /// A frame for the current peer (MJPG supervisor outcome)
    Outbound(Bytes),
    /// Verdict of an ask-alive probe, carrying the parked new connection
    AliveVerdict {
        alive: bool,
        stream: TcpStream,
        peer: String,
    },
}

/// What woke the loop this tick
enum Wake {
    Tick,
    Event(LoopEvent),
    Incoming(std::io::Result<(TcpStream, SocketAddr)>),
    Readable,
    Writable,
}

/// The KVM bridge server
pub struct Server {
    listener: TcpListener,
    bind_addr: IpAddr,
    port: u16,
    session: Option<Session>,
    uart: UartLink,
    mjpg: Arc<Mutex<MjpgSupervisor>>,
    events_tx: mpsc::Sender<LoopEvent>,
    events_rx: mpsc::Receiver<LoopEvent>,
    alive_answer: Arc<AtomicBool>,
    shutdown: Arc<ShutdownFlag>,
}

impl Server {
    /// Bind the dual-stack listener and assemble the server
    ///
    /// IPv4 bind addresses land on the AF_INET6 socket in v4-mapped form
    /// with the v6-only option disabled.
    pub fn bind(settings: &Settings, shutdown: Arc<ShutdownFlag>) -> Result<Server> {
        let v6 = match settings.bind {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        let addr = SocketAddr::from((v6, settings.port));
        let map_err = |source: std::io::Error| KvmError::Bind {
            addr: addr.to_string(),
            source,
        };

        let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP)).map_err(map_err)?;
        socket.set_only_v6(false).map_err(map_err)?;
        socket.set_reuse_address(true).map_err(map_err)?;
        socket.bind(&addr.into()).map_err(map_err)?;
        socket.listen(128).map_err(map_err)?;
        socket.set_nonblocking(true).map_err(map_err)?;
        let listener = TcpListener::from_std(socket.into()).map_err(map_err)?;
        debug!("Server socket is now listening");

        let (events_tx, events_rx) = mpsc::channel(64);
        Ok(Server {
            listener,
            bind_addr: settings.bind,
            port: settings.port,
            session: None,
            uart: UartLink::new(),
            mjpg: Arc::new(Mutex::new(MjpgSupervisor::new(
                settings.mjpg_root.clone(),
                settings.mjpg_logfile.clone(),
            ))),
            events_tx,
            events_rx,
            alive_answer: Arc::new(AtomicBool::new(false)),
            shutdown,
        })
    }

    /// Run until the shutdown flag flips, then tear down in order
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Server bind with address {} started on port {}",
            display_ip(self.bind_addr),
            self.port
        );

        while self.shutdown.should_run() {
            match self.next_wake().await {
                Wake::Tick => self.check_idle(),
                Wake::Event(ev) => self.handle_event(ev),
                Wake::Incoming(res) => self.handle_incoming(res),
                Wake::Readable => self.handle_readable(),
                Wake::Writable => self.flush_outbound().await,
            }
        }

        self.teardown().await;
        Ok(())
    }

    async fn next_wake(&mut self) -> Wake {
        let listener = &self.listener;
        let events = &mut self.events_rx;
        match &self.session {
            Some(sess) => {
                let stream = sess.stream();
                let want_write = sess.has_outbound();
                tokio::select! {
                    biased;
                    Some(ev) = events.recv() => Wake::Event(ev),
                    _ = stream.readable() => Wake::Readable,
                    _ = stream.writable(), if want_write => Wake::Writable,
                    res = listener.accept() => Wake::Incoming(res),
                    _ = tokio::time::sleep(SELECT_TIMEOUT) => Wake::Tick,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    Some(ev) = events.recv() => Wake::Event(ev),
                    res = listener.accept() => Wake::Incoming(res),
                    _ = tokio::time::sleep(SELECT_TIMEOUT) => Wake::Tick,
                }
            }
        }
    }

    // =========================================================================
    // Admission
    // =========================================================================

    fn handle_incoming(&mut self, res: std::io::Result<(TcpStream, SocketAddr)>) {
        let (stream, addr) = match res {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Accept failed: {}", e);
                return;
            }
        };
        let _ = stream.set_nodelay(true);
        let peer = session::format_peer(addr);

        match &self.session {
            None => self.install_peer(stream, addr),
            Some(sess) if !sess.accepted => {
                // The old peer never handshook; it loses the slot outright
                self.session = None;
                self.install_peer(stream, addr);
            }
            Some(_) => {
                debug!("Sent ask alive message to client");
                self.alive_answer.store(false, Ordering::SeqCst);
                self.queue_frame(protocol::ask_alive());
                trace!("Put the ask-alive waiter on the executor");
                let flag = self.alive_answer.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let answered = async {
                        while !flag.load(Ordering::SeqCst) {
                            tokio::time::sleep(ASK_ALIVE_POLL).await;
                        }
                    };
                    let alive = tokio::time::timeout(ASK_ALIVE_TIMEOUT, answered)
                        .await
                        .is_ok();
                    let _ = tx
                        .send(LoopEvent::AliveVerdict {
                            alive,
                            stream,
                            peer,
                        })
                        .await;
                });
            }
        }
    }

    fn install_peer(&mut self, stream: TcpStream, addr: SocketAddr) {
        let sess = Session::new(stream, addr);
        info!("Received a connection from {}, accepted", sess.peer());
        self.session = Some(sess);
    }

    fn handle_event(&mut self, ev: LoopEvent) {
        match ev {
            LoopEvent::Outbound(frame) => self.queue_frame(frame),
            LoopEvent::AliveVerdict {
                alive,
                stream,
                peer,
            } => {
                if alive {
                    // Current peer answered in time; the newcomer is closed
                    info!("Received another connection from {}, rejected", peer);
                    drop(stream);
                    return;
                }
                if self.session.is_some() {
                    self.disconnect("wait ask alive response timeout");
                }
                match stream.peer_addr() {
                    Ok(addr) => self.install_peer(stream, addr),
                    Err(_) => debug!("Displacing connection from {} vanished before install", peer),
                }
            }
        }
    }

    // =========================================================================
    // Receive path
    // =========================================================================

    fn handle_readable(&mut self) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let res = {
            let Some(sess) = &self.session else { return };
            sess.stream().try_read(&mut buf)
        };
        match res {
            Ok(0) => self.disconnect("server got FIN"),
            Ok(n) => {
                if let Some(sess) = &mut self.session {
                    sess.touch();
                    sess.parser.feed(&buf[..n]);
                }
                self.process_requests();
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                self.disconnect("server got RST")
            }
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionAborted => {
                self.disconnect("connection aborted")
            }
            Err(e) => {
                warn!("Read error on client socket: {}", e);
                self.disconnect("socket error");
            }
        }
    }

    fn process_requests(&mut self) {
        enum Step {
            NeedMore,
            Reject(String),
            Req(Request),
        }
        loop {
            let step = {
                let Some(sess) = self.session.as_mut() else {
                    return;
                };
                if !sess.accepted {
                    match sess.parser.handshake_opening() {
                        None => Step::NeedMore,
                        Some(false) => Step::Reject(sess.peer().to_string()),
                        Some(true) => match sess.parser.next_request() {
                            Some(req) => Step::Req(req),
                            None => Step::NeedMore,
                        },
                    }
                } else {
                    match sess.parser.next_request() {
                        Some(req) => Step::Req(req),
                        None => Step::NeedMore,
                    }
                }
            };
            match step {
                Step::NeedMore => return,
                Step::Reject(peer) => {
                    info!("Rejected connection from {}: invalid handshake", peer);
                    self.session = None;
                    return;
                }
                Step::Req(req) => self.dispatch(req),
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatch(&mut self, req: Request) {
        match req {
            Request::Handshake => {
                info!("Got a handshake message");
                if let Some(sess) = &mut self.session {
                    sess.accepted = true;
                }
                trace!("Put handshake response to write queue");
                self.queue_frame(protocol::handshake());
            }
            Request::Goodbye => self.close_client("Got a goodbye message"),
            Request::ReplyAlive => {
                debug!("Got a reply alive message");
                self.alive_answer.store(true, Ordering::SeqCst);
            }
            Request::ListUart => {
                debug!("Got a list uarts request message");
                let devices = capture::list_uart_devices();
                self.queue_frame(protocol::list_uart(&devices));
            }
            Request::ListCap => {
                debug!("Got a list captures request message");
                match capture::list_capture_devices() {
                    Ok(devices) => self.queue_frame(protocol::list_captures(&devices)),
                    Err(e) => {
                        // Empty listing doubles as the enumeration-broke signal
                        error!("Video capture enumeration failed: {}", e);
                        self.queue_frame(protocol::list_captures(&[]));
                    }
                }
            }
            Request::OpenUart { name } => self.handle_open_uart(&name),
            Request::SendKey(cmd) => self.handle_send_key(cmd),
            Request::SendMouse(cmd) => self.handle_send_mouse(cmd),
            Request::SendAtx { signal } => self.handle_send_atx(signal),
            Request::RunMjpg {
                capture,
                width,
                height,
                fps,
                port,
            } => self.handle_run_mjpg(capture, width, height, fps, port),
            Request::Malformed { res_type, detail } => {
                warn!("{}", detail);
                self.queue_failure(res_type, &detail);
            }
        }
    }

    fn handle_open_uart(&mut self, name: &str) {
        debug!("Got a open uart request message");
        match self.uart.open(name) {
            Ok(outcome) => {
                info!("{} serial device", outcome.detail());
                self.queue_success(protocol::TYPE_OPEN_UART_RES, &outcome.detail());
            }
            Err(KvmError::NoSerialDevice { .. }) => {
                info!("Client requests to open an unavailable serial device");
                self.queue_failure(
                    protocol::TYPE_OPEN_UART_RES,
                    &format!(
                        "Server Error: No such device \"{}\"",
                        protocol::clip(name, 223)
                    ),
                );
            }
            Err(e) => {
                error!("Open serial device failed: {}", e);
                self.queue_failure(
                    protocol::TYPE_OPEN_UART_RES,
                    &format!(
                        "Serial Error: Cannot open device \"{}\"",
                        protocol::clip(name, 219)
                    ),
                );
            }
        }
    }

    fn handle_send_key(&mut self, cmd: KeyCommand) {
        debug!("Got a send key request message");
        const RES: u8 = protocol::TYPE_SEND_KEY_RES;
        if !self.uart.is_open() {
            error!("Send key failed as serial device not opened");
            self.queue_failure(RES, "Serial Error: Device not opened");
            return;
        }
        match cmd {
            KeyCommand::Press(key) | KeyCommand::Release(key) => {
                let press = matches!(cmd, KeyCommand::Press(_));
                let action = if press { "press" } else { "release" };
                let label = key_label(key);
                match self.uart.write_frames(&wire::key_click(press, key)) {
                    Ok(()) => {
                        self.queue_success(RES, &format!("Key {} {}", label, action));
                    }
                    Err(e) => {
                        error!("Send key command to serial failed: {}", e);
                        let detail = write_failure_detail(
                            &e,
                            format!("Serial Error: Send {} key {} timeout", action, label),
                        );
                        self.queue_failure(RES, &detail);
                    }
                }
            }
            KeyCommand::Clear => match self.uart.write_frames(&wire::key_clear()) {
                Ok(()) => {
                    self.queue_success(RES, "Send release all keys command success");
                }
                Err(e) => {
                    error!("Send release all keys command to serial failed: {}", e);
                    let detail = write_failure_detail(
                        &e,
                        "Serial Error: Send release all keys command timeout".into(),
                    );
                    self.queue_failure(RES, &detail);
                }
            },
            KeyCommand::Text(chars) => {
                let preview = text_preview(&chars);
                match self.uart.write_frames(&wire::text_burst(&chars)) {
                    Ok(()) => {
                        self.queue_success(
                            RES,
                            &format!("Send text characters started with {} success", preview),
                        );
                    }
                    Err(e) => {
                        error!("Send text characters command to serial failed: {}", e);
                        let detail = write_failure_detail(
                            &e,
                            format!(
                                "Serial Error: Send text characters started with {} timeout",
                                preview
                            ),
                        );
                        self.queue_failure(RES, &detail);
                    }
                }
            }
        }
    }

    fn handle_send_mouse(&mut self, cmd: MouseCommand) {
        debug!("Got a send mouse request message");
        const RES: u8 = protocol::TYPE_SEND_MOUSE_RES;
        if !self.uart.is_open() {
            error!("Send mouse command failed as serial device not opened");
            self.queue_failure(RES, "Serial Error: Device not opened");
            return;
        }
        match cmd {
            MouseCommand::Press(button) | MouseCommand::Release(button) => {
                let press = matches!(cmd, MouseCommand::Press(_));
                let action = if press { "press" } else { "release" };
                let Some(name) = button_label(button) else {
                    warn!("Received invalid click mouse button code <{:02X}>", button);
                    self.queue_failure(RES, &format!("Invalid mouse button <{:02X}>", button));
                    return;
                };
                match self.uart.write_frames(&wire::mouse_click(press, button)) {
                    Ok(()) => {
                        self.queue_success(RES, &format!("Mouse button {} {}", name, action));
                    }
                    Err(e) => {
                        error!("Send click mouse button command to serial failed: {}", e);
                        let detail = write_failure_detail(
                            &e,
                            format!("Serial Error: Send {} mouse button {} timeout", action, name),
                        );
                        self.queue_failure(RES, &detail);
                    }
                }
            }
            MouseCommand::WheelUp | MouseCommand::WheelDown => {
                let up = matches!(cmd, MouseCommand::WheelUp);
                let orient = if up { "up" } else { "down" };
                match self.uart.write_frames(&wire::mouse_wheel(up)) {
                    Ok(()) => {
                        self.queue_success(RES, &format!("Mouse scrolled wheel {}", orient));
                    }
                    Err(e) => {
                        error!("Send mouse scroll wheel {} command to serial failed: {}", orient, e);
                        let detail = write_failure_detail(
                            &e,
                            format!(
                                "Serial Error: Send mouse scroll wheel {} command timeout",
                                orient
                            ),
                        );
                        self.queue_failure(RES, &detail);
                    }
                }
            }
            MouseCommand::Move { dx, dy } => {
                match self.uart.write_frames(&wire::mouse_move(dx, dy)) {
                    Ok(()) => {
                        self.queue_success(RES, &format!("Mouse shifted ({}, {})", dx, dy));
                    }
                    Err(e) => {
                        error!("Send mouse move command to serial failed: {}", e);
                        let detail = write_failure_detail(
                            &e,
                            "Serial Error: Send mouse move command timeout".into(),
                        );
                        self.queue_failure(RES, &detail);
                    }
                }
            }
            MouseCommand::Clear => match self.uart.write_frames(&wire::mouse_clear()) {
                Ok(()) => {
                    self.queue_success(RES, "Send release all mouse buttons command success");
                }
                Err(e) => {
                    error!("Send release all mouse buttons command to serial failed: {}", e);
                    let detail = write_failure_detail(
                        &e,
                        "Serial Error: Send release all mouse buttons command timeout".into(),
                    );
                    self.queue_failure(RES, &detail);
                }
            },
        }
    }

    fn handle_send_atx(&mut self, signal: u8) {
        debug!("Got a send atx request message");
        const RES: u8 = protocol::TYPE_SEND_ATX_RES;
        let Some(frame) = wire::atx(signal) else {
            warn!("Got the send atx request invalid signal <{:02X}>", signal);
            self.queue_failure(
                RES,
                &format!("Protocol Error: Received invalid signal <{:02X}>", signal),
            );
            return;
        };
        if !self.uart.is_open() {
            error!("Send atx signal failed as serial device not opened");
            self.queue_failure(RES, "Serial Error: Device not opened");
            return;
        }
        match self.uart.write_frames(&frame) {
            Ok(()) => {
                info!("Send atx signal to serial success");
                self.queue_success(RES, &format!("Signal <{:02X}> sent", signal));
            }
            Err(e) => {
                error!("Send atx signal to serial failed: {}", e);
                let detail = write_failure_detail(
                    &e,
                    format!("Serial Error: Send signal <{:02X}> timeout", signal),
                );
                self.queue_failure(RES, &detail);
            }
        }
    }

    fn handle_run_mjpg(&mut self, capture: String, width: u16, height: u16, fps: u8, port: u16) {
        debug!("Got a run mjpg-streamer request message");
        let Some(resolved) = capture::find_capture(&capture) else {
            info!("Client requests to start up an unavailable video capture");
            self.queue_failure(
                protocol::TYPE_RUN_MJPG_RES,
                &format!(
                    "Server Error: No such video capture \"{}\"",
                    protocol::clip(&capture, 216)
                ),
            );
            return;
        };
        let cfg = StreamConfig {
            capture: resolved,
            width,
            height,
            fps,
            port,
        };
        trace!("Put the mjpg-streamer supervisor task on the executor");
        let mjpg = self.mjpg.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let frame = match mjpg.lock().await.ensure(cfg).await {
                Ok(EnsureOutcome::AlreadyRunning) => protocol::status(
                    protocol::TYPE_RUN_MJPG_RES,
                    protocol::STATUS_SUCCESS,
                    "Already started",
                ),
                Ok(EnsureOutcome::Started) => protocol::status(
                    protocol::TYPE_RUN_MJPG_RES,
                    protocol::STATUS_SUCCESS,
                    "Started",
                ),
                Ok(EnsureOutcome::Exited { status }) => protocol::status(
                    protocol::TYPE_RUN_MJPG_RES,
                    protocol::STATUS_FAILURE,
                    &format!(
                        "Server Error: mjpg-streamer exited with status {} unexpected",
                        status
                    ),
                ),
                Err(e) => {
                    error!("Cannot start mjpg-streamer: {:#}", e);
                    protocol::status(
                        protocol::TYPE_RUN_MJPG_RES,
                        protocol::STATUS_FAILURE,
                        "Server Error: Cannot start mjpg-streamer",
                    )
                }
            };
            let _ = tx.send(LoopEvent::Outbound(frame)).await;
        });
    }

    // =========================================================================
    // Send path
    // =========================================================================

    fn queue_frame(&mut self, frame: Bytes) {
        match &mut self.session {
            Some(sess) => sess.queue(frame),
            None => debug!("Dropped an outbound frame: no client attached"),
        }
    }

    fn queue_success(&mut self, res_type: u8, detail: &str) {
        trace!("Put a success response to write queue");
        self.queue_frame(protocol::status(res_type, protocol::STATUS_SUCCESS, detail));
    }

    fn queue_failure(&mut self, res_type: u8, detail: &str) {
        trace!("Put a failure response to write queue");
        self.queue_frame(protocol::status(res_type, protocol::STATUS_FAILURE, detail));
    }

    async fn flush_outbound(&mut self) {
        let data = {
            let Some(sess) = &mut self.session else { return };
            if !sess.has_outbound() {
                return;
            }
            sess.take_outbound()
        };
        let res = {
            let Some(sess) = &self.session else { return };
            tokio::time::timeout(TIMEOUT_RT, write_with_backoff(sess.stream(), &data)).await
        };
        match res {
            // Deadline expired: the remainder is dropped silently and the
            // client may retry
            Err(_) => debug!("Send deadline expired, dropped unsent bytes"),
            Ok(Ok(())) => trace!("Sent a message to client"),
            Ok(Err(e)) => match e.kind() {
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                    self.disconnect("server got RST")
                }
                std::io::ErrorKind::ConnectionAborted => self.disconnect("connection aborted"),
                _ => {
                    warn!("Write error on client socket: {}", e);
                    self.disconnect("socket error");
                }
            },
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    fn check_idle(&mut self) {
        if self
            .session
            .as_ref()
            .is_some_and(|sess| sess.idle_for() > SOCK_TIMEOUT)
        {
            self.disconnect("socket timeout");
        }
    }

    fn disconnect(&mut self, reason: &str) {
        self.close_client(&format!("Disconnected the TCP as {}", reason));
    }

    /// Drop the peer and close the serial link; MjpgState survives so the
    /// video stream continues across peer changes
    fn close_client(&mut self, reason: &str) {
        info!("{}", reason);
        self.uart.close();
        if self.session.take().is_some() {
            info!("Closed the accepted client socket");
        }
    }

    async fn teardown(&mut self) {
        match self.shutdown.cause() {
            Some(TermCause::User) => info!("Server terminated by user"),
            Some(TermCause::System) => info!("Server terminated by system"),
            None => info!("Server loop exited"),
        }
        self.say_goodbye();
        self.uart.close();
        self.mjpg.lock().await.shutdown().await;
        info!("Server terminated completely");
    }

    /// One best-effort goodbye write; pending deferred tasks are abandoned
    fn say_goodbye(&mut self) {
        if let Some(sess) = &self.session {
            if sess.accepted {
                let _ = sess.stream().try_write(&protocol::goodbye());
                info!("Sent goodbye message to client");
            }
        }
        self.session = None;
    }
}

/// Retry partial writes with a fixed backoff until drained or failed;
/// the caller bounds the total time
async fn write_with_backoff(stream: &TcpStream, mut data: &[u8]) -> std::io::Result<()> {
    loop {
        tokio::time::sleep(SEND_RETRY_DELAY).await;
        match stream.try_write(data) {
            Ok(n) => {
                data = &data[n..];
                if data.is_empty() {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }
    }
}

/// Bind/peer address display form: v4-mapped shown as plain IPv4
fn display_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}

/// Detail string for a failed serial write: the timeout phrasing for real
/// timeouts, a generic one otherwise
fn write_failure_detail(e: &std::io::Error, timeout_detail: String) -> String {
    if e.kind() == std::io::ErrorKind::TimedOut {
        timeout_detail
    } else {
        "Serial Error: Device write failed".into()
    }
}

/// Printable single keys are quoted in response details, others shown hex
fn key_label(key: u8) -> String {
    let ch = key as char;
    if key < 0x80 && (ch.is_ascii_graphic() || ch == ' ') {
        format!("\"{}\"", ch)
    } else {
        format!("<{:02X}>", key)
    }
}

fn button_label(button: u8) -> Option<&'static str> {
    match button {
        wire::MOUSE_LEFT => Some("left"),
        wire::MOUSE_RIGHT => Some("right"),
        wire::MOUSE_MIDDLE => Some("middle"),
        _ => None,
    }
}

/// First characters of a text burst, debug-quoted for the response detail
fn text_preview(chars: &[u8]) -> String {
    let preview: String = chars
        .iter()
        .take(MAX_TEXT_PREVIEW)
        .map(|&b| b as char)
        .collect();
    format!("{:?}", preview)
}
