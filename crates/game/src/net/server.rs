use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use glam::Vec2;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::world::{World, WorldConfig, WorldStats};

use super::events::{DisconnectReason, ServerEvent};
use super::framing::LineBuffer;
use super::protocol::{ClientMessage, DEFAULT_PORT, ServerMessage};
use super::unix_time_secs;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(usize::MAX);

const READ_CHUNK: usize = 4096;
/// Bytes taken from one connection per wake-up. Anything left over is
/// picked up on the next iteration so one sender cannot starve the loop.
const MAX_READ_PER_WAKE: usize = READ_CHUNK * 16;
const MAX_PENDING_EVENTS: usize = 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub poll_timeout: Duration,
    pub broadcast_interval: Duration,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            poll_timeout: Duration::from_millis(25),
            broadcast_interval: Duration::from_millis(50),
            world: WorldConfig::default(),
        }
    }
}

#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    lines: LineBuffer,
    connected_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub uptime_secs: u64,
    pub player_count: usize,
    pub projectile_count: usize,
    pub world: WorldStats,
    pub keyframes_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub lines_dropped: u64,
}

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
    pub health: u32,
    pub position: Vec2,
    pub addr: SocketAddr,
    pub connected_secs: u64,
}

/// Stops a running [`GameServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            log::warn!("Failed to wake server reactor: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Single-threaded authoritative server: one readiness loop that accepts,
/// reads, steps the world and broadcasts keyframes.
pub struct GameServer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    waker: Arc<Waker>,
    connections: HashMap<u32, Connection>,
    // Connections that hit the read budget with data still queued. Readiness
    // is edge-triggered, so no new event will arrive for them.
    backlog: HashSet<u32>,
    world: World,
    config: ServerConfig,
    running: Arc<AtomicBool>,
    started: Instant,
    last_tick: Instant,
    last_broadcast: Instant,
    pending_events: VecDeque<ServerEvent>,
    stats: ServerStats,
}

impl GameServer {
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.bind_addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        let now = Instant::now();
        Ok(Self {
            poll,
            events: Events::with_capacity(256),
            listener,
            waker,
            connections: HashMap::new(),
            backlog: HashSet::new(),
            world: World::new(config.world.clone()),
            config,
            running: Arc::new(AtomicBool::new(true)),
            started: now,
            last_tick: now,
            last_broadcast: now,
            pending_events: VecDeque::new(),
            stats: ServerStats::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) -> io::Result<()> {
        while self.is_running() {
            self.poll_once()?;
        }
        self.shutdown_connections();
        Ok(())
    }

    /// One reactor iteration: wait for readiness (bounded by the poll
    /// timeout), service sockets, step the world, broadcast when due.
    pub fn poll_once(&mut self) -> io::Result<()> {
        let timeout = if self.backlog.is_empty() {
            self.config.poll_timeout
        } else {
            Duration::ZERO
        };
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        let mut accept = false;
        let mut readable: Vec<u32> = self.backlog.drain().collect();
        for event in self.events.iter() {
            match event.token() {
                LISTENER => accept = true,
                WAKER => {}
                Token(token) => {
                    if let Ok(id) = u32::try_from(token) {
                        readable.push(id);
                    }
                }
            }
        }

        readable.sort_unstable();
        readable.dedup();

        if accept {
            self.accept_pending();
        }
        for id in readable {
            self.read_connection(id);
        }

        self.tick();

        if self.last_broadcast.elapsed() >= self.config.broadcast_interval {
            self.last_broadcast = Instant::now();
            self.broadcast();
        }

        Ok(())
    }

    pub fn shutdown_connections(&mut self) {
        let mut ids: Vec<u32> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.disconnect(id, DisconnectReason::Shutdown);
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    self.push_event(ServerEvent::Error {
                        message: format!("Accept failed: {}", e),
                    });
                    break;
                }
            }
        }
    }

    fn admit(&mut self, mut stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("set_nodelay failed for {}: {}", addr, e);
        }

        let id = self.world.register();
        if let Err(e) =
            self.poll
                .registry()
                .register(&mut stream, Token(id as usize), Interest::READABLE)
        {
            log::warn!("Failed to register connection from {}: {}", addr, e);
            self.world.unregister(id);
            return;
        }

        self.connections.insert(
            id,
            Connection {
                stream,
                addr,
                lines: LineBuffer::new(),
                connected_at: Instant::now(),
            },
        );
        log::info!("Player {} connected from {}", id, addr);
        self.push_event(ServerEvent::PlayerConnected {
            player_id: id,
            addr,
        });

        match ServerMessage::welcome(id).encode() {
            Ok(line) => {
                if let Err(reason) = self.write_to(id, line.as_bytes()) {
                    self.disconnect(id, reason);
                }
            }
            Err(e) => log::warn!("Failed to encode welcome for player {}: {}", id, e),
        }
    }

    fn read_connection(&mut self, id: u32) {
        let mut chunk = [0u8; READ_CHUNK];
        let mut budget = MAX_READ_PER_WAKE;

        let outcome = loop {
            if budget == 0 {
                self.backlog.insert(id);
                break None;
            }
            let Some(conn) = self.connections.get_mut(&id) else {
                return;
            };
            let limit = budget.min(READ_CHUNK);
            match conn.stream.read(&mut chunk[..limit]) {
                Ok(0) => break Some(DisconnectReason::Closed),
                Ok(n) => {
                    conn.lines.extend(&chunk[..n]);
                    self.stats.bytes_received += n as u64;
                    budget -= n;
                    // Apply per chunk so the line length cap holds while reading.
                    self.apply_lines(id);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break None,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Read from player {} failed: {}", id, e);
                    break Some(DisconnectReason::ReadError);
                }
            }
        };

        if let Some(reason) = outcome {
            self.disconnect(id, reason);
        }
    }

    fn apply_lines(&mut self, id: u32) {
        while let Some(line) = self
            .connections
            .get_mut(&id)
            .and_then(|conn| conn.lines.next_line())
        {
            self.handle_line(id, &line);
        }
    }

    fn handle_line(&mut self, id: u32, line: &str) {
        if line.is_empty() {
            return;
        }

        match ClientMessage::parse(line) {
            Ok(ClientMessage::Hello { name }) => {
                if self.world.set_name(id, &name) {
                    let name = self
                        .world
                        .player(id)
                        .map(|p| p.name.clone())
                        .unwrap_or_default();
                    log::info!("Player {} is now known as {}", id, name);
                    self.push_event(ServerEvent::PlayerRenamed {
                        player_id: id,
                        name,
                    });
                }
            }
            Ok(ClientMessage::Input(intent)) => {
                self.world.set_intent(id, intent);
            }
            Err(e) => {
                log::debug!("Dropping line from player {}: {}", id, e);
                self.stats.lines_dropped += 1;
            }
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        for event in self.world.step(dt) {
            log::debug!("{:?}", event);
            self.push_event(ServerEvent::Game(event));
        }
    }

    fn broadcast(&mut self) {
        if self.connections.is_empty() {
            return;
        }

        let keyframe = self.world.keyframe(unix_time_secs());
        let line = match ServerMessage::keyframe(keyframe).encode() {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Failed to encode keyframe: {}", e);
                return;
            }
        };

        let mut ids: Vec<u32> = self.connections.keys().copied().collect();
        ids.sort_unstable();

        let mut failed = Vec::new();
        for id in ids {
            if let Err(reason) = self.write_to(id, line.as_bytes()) {
                failed.push((id, reason));
            }
        }
        for (id, reason) in failed {
            self.disconnect(id, reason);
        }

        self.stats.keyframes_sent += 1;
    }

    /// Single non-blocking write. Anything short of the full message is a
    /// failure: the connection has no outbound queue.
    fn write_to(&mut self, id: u32, bytes: &[u8]) -> Result<(), DisconnectReason> {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Ok(());
        };

        loop {
            match conn.stream.write(bytes) {
                Ok(n) if n == bytes.len() => {
                    self.stats.bytes_sent += n as u64;
                    return Ok(());
                }
                Ok(n) => {
                    log::debug!("Short write to player {} ({}/{})", id, n, bytes.len());
                    return Err(DisconnectReason::ShortWrite);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(DisconnectReason::ShortWrite);
                }
                Err(e) => {
                    log::debug!("Write to player {} failed: {}", id, e);
                    return Err(DisconnectReason::WriteError);
                }
            }
        }
    }

    fn disconnect(&mut self, id: u32, reason: DisconnectReason) {
        self.backlog.remove(&id);
        if let Some(mut conn) = self.connections.remove(&id) {
            if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
                log::debug!("Deregister of player {} failed: {}", id, e);
            }
            if let Err(e) = conn.stream.shutdown(Shutdown::Both) {
                log::debug!("Shutdown of player {} socket failed: {}", id, e);
            }
        }

        if self.world.unregister(id).is_some() {
            log::info!("Player {} {}", id, reason.as_str());
            self.push_event(ServerEvent::PlayerDisconnected {
                player_id: id,
                reason,
            });
        }
    }

    fn push_event(&mut self, event: ServerEvent) {
        if self.pending_events.len() >= MAX_PENDING_EVENTS {
            self.pending_events.pop_front();
        }
        self.pending_events.push_back(event);
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.started.elapsed().as_secs(),
            player_count: self.world.registry().len(),
            projectile_count: self.world.projectiles().len(),
            world: self.world.stats(),
            ..self.stats.clone()
        }
    }

    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.world
            .players()
            .filter_map(|player| {
                let conn = self.connections.get(&player.id)?;
                Some(PlayerInfo {
                    id: player.id,
                    name: player.name.clone(),
                    health: player.health,
                    position: player.position,
                    addr: conn.addr,
                    connected_secs: conn.connected_at.elapsed().as_secs(),
                })
            })
            .collect()
    }
}
