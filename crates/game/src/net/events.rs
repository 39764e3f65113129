use std::net::SocketAddr;

use crate::world::GameEvent;

#[derive(Debug, Clone)]
pub enum ServerEvent {
    PlayerConnected {
        player_id: u32,
        addr: SocketAddr,
    },
    PlayerDisconnected {
        player_id: u32,
        reason: DisconnectReason,
    },
    PlayerRenamed {
        player_id: u32,
        name: String,
    },
    Game(GameEvent),
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Closed,
    ReadError,
    WriteError,
    /// Write accepted fewer bytes than the message; there is no send queue.
    ShortWrite,
    Shutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Closed => "disconnected",
            DisconnectReason::ReadError => "dropped (read error)",
            DisconnectReason::WriteError => "dropped (write error)",
            DisconnectReason::ShortWrite => "dropped (send buffer full)",
            DisconnectReason::Shutdown => "disconnected (server shutdown)",
        }
    }
}
