mod config;
mod player;
mod projectile;
mod registry;
mod simulation;

pub use config::WorldConfig;
pub use player::{ClientIntent, DEFAULT_PLAYER_NAME, Player};
pub use projectile::{BULLET_ID_BASE, Projectile};
pub use registry::Registry;
pub use simulation::{GameEvent, World, WorldStats};
