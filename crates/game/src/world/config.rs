use glam::Vec2;

/// Tuning for the authoritative arena simulation.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub spawn_position: Vec2,

    pub player_speed: f32,
    pub max_health: u32,
    pub hit_radius: f32,
    pub damage: u32,

    pub fire_cooldown: f32,
    pub bullet_speed: f32,
    pub bullet_lifetime: f32,

    /// Aim vectors shorter than this fall back to straight up.
    pub min_aim_length: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            spawn_position: Vec2::new(400.0, 300.0),

            player_speed: 200.0,
            max_health: 100,
            hit_radius: 20.0,
            damage: 10,

            fire_cooldown: 0.3,
            bullet_speed: 400.0,
            bullet_lifetime: 2.0,

            min_aim_length: 1.0e-4,
        }
    }
}

impl WorldConfig {
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}
