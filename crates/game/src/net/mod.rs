mod client;
mod events;
mod framing;
mod protocol;
mod server;

use std::time::{SystemTime, UNIX_EPOCH};

pub use client::{
    ClientConfig, ClientHandle, ClientReactor, ConnectionState, USERNAME_ENV, resolve_name,
};
pub use events::{DisconnectReason, ServerEvent};
pub use framing::{LineBuffer, MAX_LINE_LENGTH};
pub use protocol::{
    ClientMessage, DEFAULT_HOST, DEFAULT_PORT, EntityKind, EntitySnapshot, Keyframe, ProtocolError,
    ServerMessage,
};
pub use server::{GameServer, PlayerInfo, ServerConfig, ServerHandle, ServerStats};

/// Seconds since the UNIX epoch; keyframe timestamps use this clock.
pub fn unix_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
