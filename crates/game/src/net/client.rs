use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;

use crate::snapshot::SnapshotBuffer;
use crate::world::{ClientIntent, DEFAULT_PLAYER_NAME};

use super::framing::LineBuffer;
use super::protocol::{ClientMessage, DEFAULT_PORT, ServerMessage};

const STREAM: Token = Token(0);
const WAKER: Token = Token(1);

const READ_CHUNK: usize = 16 * 1024;

pub const USERNAME_ENV: &str = "NETWORK_USERNAME";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub name: String,
    pub poll_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            name: resolve_name(None),
            poll_timeout: Duration::from_millis(25),
        }
    }
}

/// Explicit name if non-empty, then `NETWORK_USERNAME`, then the default.
pub fn resolve_name(explicit: Option<&str>) -> String {
    choose_name(explicit, std::env::var(USERNAME_ENV).ok().as_deref())
}

fn choose_name(explicit: Option<&str>, from_env: Option<&str>) -> String {
    [explicit, from_env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(DEFAULT_PLAYER_NAME)
        .to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    /// 0 until the welcome arrives; the server never assigns 0.
    own_id: AtomicU32,
    running: AtomicBool,
    pending_input: Mutex<Option<ClientIntent>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Thread-safe side of a [`ClientReactor`], used by whoever drives input.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    shared: Arc<Shared>,
    waker: Arc<Waker>,
}

impl ClientHandle {
    /// Queues the intent for the reactor to write. Dropped unless connected.
    /// Only the latest intent is kept, but a fire edge that has not been
    /// written yet survives being overwritten.
    pub fn send_input(&self, intent: ClientIntent) -> bool {
        if self.shared.state() != ConnectionState::Connected {
            return false;
        }

        {
            let mut pending = self.shared.pending_input.lock();
            let merged = match pending.take() {
                Some(previous) if previous.fire && !intent.fire => ClientIntent {
                    fire: true,
                    aim: previous.aim,
                    ..intent
                },
                _ => intent,
            };
            *pending = Some(merged);
        }

        self.wake();
        true
    }

    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.wake();
    }

    pub fn own_id(&self) -> Option<u32> {
        match self.shared.own_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn wake(&self) {
        if let Err(e) = self.waker.wake() {
            log::debug!("Failed to wake client reactor: {}", e);
        }
    }
}

/// One outbound connection driven by a readiness loop. Keyframes go into
/// the shared [`SnapshotBuffer`]; input comes in through [`ClientHandle`].
pub struct ClientReactor {
    poll: Poll,
    events: Events,
    stream: TcpStream,
    waker: Arc<Waker>,
    shared: Arc<Shared>,
    buffer: Arc<SnapshotBuffer>,
    lines: LineBuffer,
    config: ClientConfig,
}

impl ClientReactor {
    pub fn connect(config: ClientConfig, buffer: Arc<SnapshotBuffer>) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut stream = TcpStream::connect(config.server_addr)?;
        poll.registry().register(
            &mut stream,
            STREAM,
            Interest::READABLE | Interest::WRITABLE,
        )?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        log::info!("Connecting to {}", config.server_addr);
        // Frames from an earlier connection must not blend into this one.
        buffer.clear();

        Ok(Self {
            poll,
            events: Events::with_capacity(64),
            stream,
            waker,
            shared: Arc::new(Shared {
                state: AtomicU8::new(ConnectionState::Connecting as u8),
                own_id: AtomicU32::new(0),
                running: AtomicBool::new(true),
                pending_input: Mutex::new(None),
            }),
            buffer,
            lines: LineBuffer::new(),
            config,
        })
    }

    /// Connects and runs the reactor on its own thread.
    pub fn spawn(
        config: ClientConfig,
        buffer: Arc<SnapshotBuffer>,
    ) -> io::Result<(ClientHandle, JoinHandle<()>)> {
        let mut reactor = Self::connect(config, buffer)?;
        let handle = reactor.handle();
        let thread = std::thread::Builder::new()
            .name("skirmish-net".into())
            .spawn(move || {
                if let Err(e) = reactor.run() {
                    log::warn!("Client reactor stopped: {}", e);
                }
            })?;
        Ok((handle, thread))
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            shared: Arc::clone(&self.shared),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Loops until stopped or the connection ends.
    pub fn run(&mut self) -> io::Result<()> {
        let result = loop {
            if !self.shared.running.load(Ordering::SeqCst)
                || self.state() == ConnectionState::Disconnected
            {
                break Ok(());
            }
            if let Err(e) = self.poll_once() {
                break Err(e);
            }
        };
        self.close();
        result
    }

    pub fn poll_once(&mut self) -> io::Result<()> {
        match self
            .poll
            .poll(&mut self.events, Some(self.config.poll_timeout))
        {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        let mut stream_ready = false;
        for event in self.events.iter() {
            if event.token() == STREAM {
                stream_ready = true;
            }
        }

        if stream_ready {
            if self.state() == ConnectionState::Connecting {
                self.finish_connect()?;
            }
            if self.state() == ConnectionState::Connected {
                self.read_available();
            }
        }

        if self.state() == ConnectionState::Connected {
            self.flush_input();
        }

        Ok(())
    }

    fn finish_connect(&mut self) -> io::Result<()> {
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => {
                log::info!("Connection to {} failed: {}", self.config.server_addr, e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Ok(());
            }
        }

        match self.stream.peer_addr() {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotConnected => return Ok(()),
            Err(e) => {
                log::info!("Connection to {} failed: {}", self.config.server_addr, e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Ok(());
            }
        }

        self.poll
            .registry()
            .reregister(&mut self.stream, STREAM, Interest::READABLE)?;
        if let Err(e) = self.stream.set_nodelay(true) {
            log::debug!("set_nodelay failed: {}", e);
        }

        let hello = ClientMessage::hello(self.config.name.clone()).encode();
        if !self.write_line(&hello) {
            self.shared.set_state(ConnectionState::Disconnected);
            return Ok(());
        }

        log::info!(
            "Connected to {} as {}",
            self.config.server_addr,
            self.config.name
        );
        self.shared.set_state(ConnectionState::Connected);

        // Bytes may have arrived with the connect edge; mio will not repeat it.
        self.read_available();
        Ok(())
    }

    fn read_available(&mut self) {
        let mut chunk = [0u8; READ_CHUNK];

        let closed = loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    log::info!("Server closed the connection");
                    break true;
                }
                Ok(n) => self.lines.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::info!("Read from server failed: {}", e);
                    break true;
                }
            }
        };

        while let Some(line) = self.lines.next_line() {
            self.handle_line(&line);
        }

        if closed {
            self.shared.set_state(ConnectionState::Disconnected);
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        match ServerMessage::parse(line) {
            Ok(ServerMessage::Welcome { id }) => {
                log::info!("Assigned player id {}", id);
                self.shared.own_id.store(id, Ordering::SeqCst);
            }
            Ok(ServerMessage::Keyframe(keyframe)) => self.buffer.push(keyframe),
            Err(e) => log::debug!("Dropping server line: {}", e),
        }
    }

    fn flush_input(&mut self) {
        let Some(intent) = self.shared.pending_input.lock().take() else {
            return;
        };
        self.write_line(&ClientMessage::input(intent).encode());
    }

    /// Non-blocking write of one whole line; lost (not retried) on failure.
    fn write_line(&mut self, line: &str) -> bool {
        loop {
            match self.stream.write(line.as_bytes()) {
                Ok(n) if n == line.len() => return true,
                Ok(_) => {
                    log::warn!("Short write to server; input lost");
                    return false;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    log::debug!("Socket not writable; input lost");
                    return false;
                }
                Err(e) => {
                    log::info!("Write to server failed: {}", e);
                    self.shared.set_state(ConnectionState::Disconnected);
                    return false;
                }
            }
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.poll.registry().deregister(&mut self.stream) {
            log::debug!("Deregister failed: {}", e);
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("Socket shutdown failed: {}", e);
        }
        self.shared.set_state(ConnectionState::Disconnected);
        *self.shared.pending_input.lock() = None;
    }
}
