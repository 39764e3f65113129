pub mod net;
pub mod snapshot;
pub mod world;

pub use net::{
    ClientConfig, ClientHandle, ClientMessage, ClientReactor, ConnectionState, DEFAULT_HOST,
    DEFAULT_PORT, DisconnectReason, EntityKind, EntitySnapshot, GameServer, Keyframe, LineBuffer,
    PlayerInfo, ProtocolError, ServerConfig, ServerEvent, ServerHandle, ServerMessage,
    ServerStats,
};
pub use snapshot::SnapshotBuffer;
pub use world::{ClientIntent, GameEvent, Player, Projectile, Registry, World, WorldConfig, WorldStats};
