#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use skirmish::{GameServer, Keyframe, ServerConfig, ServerHandle, ServerMessage};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    handle: ServerHandle,
    thread: Option<JoinHandle<io::Result<()>>>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Starts on an ephemeral loopback port; `bind_addr` is overridden.
    pub fn with_config(config: ServerConfig) -> Self {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..config
        };
        let mut server = GameServer::bind(config).expect("bind server");
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            handle,
            thread: Some(thread),
        }
    }

    pub fn stop(&mut self) {
        self.handle.stop();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Blocking line client speaking the wire protocol by hand.
pub struct RawClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    partial: Vec<u8>,
}

impl RawClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let writer = stream.try_clone().unwrap();

        Self {
            reader: BufReader::new(stream),
            writer,
            partial: Vec::new(),
        }
    }

    pub fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.flush().unwrap();
    }

    /// Next raw line, or `None` on EOF or when the deadline passes.
    pub fn read_line(&mut self, deadline: Instant) -> Option<String> {
        while Instant::now() < deadline {
            match self.reader.read_until(b'\n', &mut self.partial) {
                Ok(0) => return None,
                Ok(_) if self.partial.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&self.partial).trim().to_owned();
                    self.partial.clear();
                    return Some(line);
                }
                Ok(_) => return None,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(_) => return None,
            }
        }
        None
    }

    pub fn recv(&mut self) -> ServerMessage {
        let line = self
            .read_line(Instant::now() + TIMEOUT)
            .expect("no line from server");
        ServerMessage::parse(&line).expect("unparseable server line")
    }

    pub fn expect_welcome(&mut self) -> u32 {
        match self.recv() {
            ServerMessage::Welcome { id } => id,
            other => panic!("expected welcome, got {:?}", other),
        }
    }

    pub fn wait_for_keyframe(&mut self, predicate: impl FnMut(&Keyframe) -> bool) -> Keyframe {
        self.wait_for_keyframe_within(TIMEOUT, predicate)
    }

    pub fn wait_for_keyframe_within(
        &mut self,
        timeout: Duration,
        mut predicate: impl FnMut(&Keyframe) -> bool,
    ) -> Keyframe {
        let deadline = Instant::now() + timeout;
        while let Some(line) = self.read_line(deadline) {
            if let Ok(ServerMessage::Keyframe(keyframe)) = ServerMessage::parse(&line) {
                if predicate(&keyframe) {
                    return keyframe;
                }
            }
        }
        panic!("no matching keyframe before deadline");
    }

    /// Keyframes received over `window`.
    pub fn collect_keyframes(&mut self, window: Duration) -> Vec<Keyframe> {
        let deadline = Instant::now() + window;
        let mut keyframes = Vec::new();
        while let Some(line) = self.read_line(deadline) {
            if let Ok(ServerMessage::Keyframe(keyframe)) = ServerMessage::parse(&line) {
                keyframes.push(keyframe);
            }
        }
        keyframes
    }

    /// True once the server has closed this connection.
    pub fn wait_for_eof(&mut self) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            if Instant::now() >= deadline {
                return false;
            }
            match self.reader.read_until(b'\n', &mut self.partial) {
                Ok(0) => return true,
                Ok(_) => self.partial.clear(),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(_) => return true,
            }
        }
    }
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
