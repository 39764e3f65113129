use glam::Vec2;

/// Bullets take the upper half of the id space, players the lower half.
/// Bullet ids wrap back to this base rather than into player ids.
pub const BULLET_ID_BASE: u32 = 1 << 31;

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub owner: u32,
    pub lifetime: f32,
}

impl Projectile {
    pub fn new(id: u32, owner: u32, position: Vec2, velocity: Vec2, lifetime: f32) -> Self {
        Self {
            id,
            position,
            velocity,
            owner,
            lifetime,
        }
    }

    /// Moves the projectile and burns lifetime. Returns false once expired.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.position += self.velocity * dt;
        self.lifetime -= dt;
        self.lifetime > 0.0
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime <= 0.0
    }

    pub fn hits(&self, target: Vec2, radius: f32) -> bool {
        self.position.distance_squared(target) < radius * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_and_expires() {
        let mut bullet = Projectile::new(BULLET_ID_BASE, 1, Vec2::ZERO, Vec2::new(400.0, 0.0), 0.1);

        assert!(bullet.advance(0.05));
        assert!((bullet.position - Vec2::new(20.0, 0.0)).length() < 1.0e-4);
        assert!(!bullet.advance(0.05));
        assert!(bullet.is_expired());
    }

    #[test]
    fn hit_radius_is_exclusive() {
        let bullet = Projectile::new(BULLET_ID_BASE, 1, Vec2::ZERO, Vec2::ZERO, 1.0);
        assert!(bullet.hits(Vec2::new(19.9, 0.0), 20.0));
        assert!(!bullet.hits(Vec2::new(20.0, 0.0), 20.0));
    }
}
