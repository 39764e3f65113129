use glam::Vec2;

pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Latest input received from a connection. Overwritten by every INPUT line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientIntent {
    pub movement: Vec2,
    /// One-shot: cleared by the first simulation tick that reads it.
    pub fire: bool,
    pub aim: Vec2,
}

impl Default for ClientIntent {
    fn default() -> Self {
        Self {
            movement: Vec2::ZERO,
            fire: false,
            aim: Vec2::NEG_Y,
        }
    }
}

impl ClientIntent {
    pub fn moving(movement: Vec2) -> Self {
        Self {
            movement,
            ..Default::default()
        }
    }

    pub fn firing(aim: Vec2) -> Self {
        Self {
            fire: true,
            aim,
            ..Default::default()
        }
    }

    /// Normalized aim, or straight up when the vector is too short to carry
    /// a direction.
    pub fn aim_direction(&self, min_length: f32) -> Vec2 {
        let length = self.aim.length();
        if length < min_length || !length.is_finite() {
            Vec2::NEG_Y
        } else {
            self.aim / length
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u32,
    pub position: Vec2,
    pub health: u32,
    pub cooldown: f32,
    pub name: String,
    pub dead: bool,
}

impl Player {
    pub fn new(id: u32, position: Vec2, health: u32) -> Self {
        Self {
            id,
            position,
            health,
            cooldown: 0.0,
            name: DEFAULT_PLAYER_NAME.to_owned(),
            dead: false,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Health floors at zero; reaching zero marks the player dead.
    pub fn apply_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.dead = true;
        }
    }

    pub fn integrate(&mut self, movement: Vec2, speed: f32, dt: f32, bounds: Vec2) {
        self.position = (self.position + movement * speed * dt).clamp(Vec2::ZERO, bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldConfig;

    fn spawn(id: u32) -> Player {
        let config = WorldConfig::default();
        Player::new(id, config.spawn_position, config.max_health)
    }

    #[test]
    fn damage_floors_at_zero() {
        let mut player = spawn(1);

        player.apply_damage(10);
        assert_eq!(player.health, 90);
        assert!(!player.is_dead());

        player.health = 5;
        player.apply_damage(10);
        assert_eq!(player.health, 0);
        assert!(player.is_dead());
    }

    #[test]
    fn exact_zero_marks_dead() {
        let mut player = spawn(1);
        player.health = 10;
        player.apply_damage(10);
        assert_eq!(player.health, 0);
        assert!(player.is_dead());
    }

    #[test]
    fn integrate_clamps_to_bounds() {
        let config = WorldConfig::default();
        let mut player = spawn(1);

        player.integrate(Vec2::new(1.0, -1.0), 200.0, 10.0, config.bounds());
        assert_eq!(player.position, Vec2::new(800.0, 0.0));
    }

    #[test]
    fn degenerate_aim_falls_back() {
        let intent = ClientIntent::firing(Vec2::new(0.0, 0.00001));
        assert_eq!(intent.aim_direction(1.0e-4), Vec2::NEG_Y);

        let intent = ClientIntent::firing(Vec2::new(3.0, 4.0));
        let dir = intent.aim_direction(1.0e-4);
        assert!((dir - Vec2::new(0.6, 0.8)).length() < 1.0e-6);
    }
}
