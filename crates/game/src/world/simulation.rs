use crate::net::{EntitySnapshot, Keyframe};

use super::config::WorldConfig;
use super::player::{ClientIntent, Player};
use super::projectile::{BULLET_ID_BASE, Projectile};
use super::registry::Registry;

/// Things that happened during one tick, for logging and dashboards.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ProjectileFired {
        owner_id: u32,
        projectile_id: u32,
    },
    DamageDealt {
        attacker_id: u32,
        target_id: u32,
        projectile_id: u32,
        remaining_health: u32,
    },
    PlayerDeath {
        player_id: u32,
        killer_id: u32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorldStats {
    pub ticks: u64,
    pub projectiles_fired: u64,
    pub hits: u64,
    pub deaths: u64,
}

/// Authoritative arena state. Only the server reactor thread touches it.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    registry: Registry,
    projectiles: Vec<Projectile>,
    next_projectile_id: u32,
    stats: WorldStats,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            registry: Registry::new(&config),
            projectiles: Vec::new(),
            next_projectile_id: BULLET_ID_BASE,
            stats: WorldStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn register(&mut self) -> u32 {
        self.registry.register()
    }

    pub fn unregister(&mut self, id: u32) -> Option<Player> {
        self.registry.unregister(id)
    }

    pub fn set_intent(&mut self, id: u32, intent: ClientIntent) -> bool {
        self.registry.set_intent(id, intent)
    }

    pub fn set_name(&mut self, id: u32, name: &str) -> bool {
        self.registry.set_name(id, name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.registry.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.registry.iter()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    /// Advances the world by `dt` seconds: players first, then projectiles
    /// and hit detection.
    pub fn step(&mut self, dt: f32) -> Vec<GameEvent> {
        // A wall clock that stepped backwards must not rewind the world.
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut events = Vec::new();

        self.step_players(dt, &mut events);
        self.step_projectiles(dt, &mut events);
        self.stats.ticks += 1;

        events
    }

    fn step_players(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let config = &self.config;
        let bounds = config.bounds();

        for (player, intent) in self.registry.entries_mut() {
            player.integrate(intent.movement, config.player_speed, dt, bounds);
            player.cooldown = (player.cooldown - dt).max(0.0);

            if intent.fire && player.cooldown <= 0.0 {
                let projectile_id = self.next_projectile_id;
                self.next_projectile_id = projectile_id.checked_add(1).unwrap_or(BULLET_ID_BASE);

                let direction = intent.aim_direction(config.min_aim_length);
                self.projectiles.push(Projectile::new(
                    projectile_id,
                    player.id,
                    player.position,
                    direction * config.bullet_speed,
                    config.bullet_lifetime,
                ));
                player.cooldown = config.fire_cooldown;

                self.stats.projectiles_fired += 1;
                events.push(GameEvent::ProjectileFired {
                    owner_id: player.id,
                    projectile_id,
                });
            }

            intent.fire = false;
        }
    }

    fn step_projectiles(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let hit_radius = self.config.hit_radius;
        let damage = self.config.damage;
        let registry = &mut self.registry;
        let stats = &mut self.stats;

        self.projectiles.retain_mut(|projectile| {
            if !projectile.advance(dt) {
                return false;
            }

            // Ascending id order: on overlap the lowest id takes the hit.
            let target = registry.iter_mut().find(|player| {
                player.id != projectile.owner
                    && !player.is_dead()
                    && projectile.hits(player.position, hit_radius)
            });

            let Some(target) = target else {
                return true;
            };

            target.apply_damage(damage);
            stats.hits += 1;
            events.push(GameEvent::DamageDealt {
                attacker_id: projectile.owner,
                target_id: target.id,
                projectile_id: projectile.id,
                remaining_health: target.health,
            });

            if target.is_dead() {
                stats.deaths += 1;
                events.push(GameEvent::PlayerDeath {
                    player_id: target.id,
                    killer_id: projectile.owner,
                });
            }

            false
        });
    }

    /// Full snapshot of every live entity, players first.
    pub fn keyframe(&self, time: f64) -> Keyframe {
        let players = self
            .registry
            .iter()
            .map(|p| EntitySnapshot::player(p.id, p.position, p.health, p.name.clone()));
        let projectiles = self
            .projectiles
            .iter()
            .map(|b| EntitySnapshot::bullet(b.id, b.position, b.owner));

        Keyframe::with_entities(time, players.chain(projectiles).collect())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    fn place(world: &mut World, id: u32, position: Vec2) {
        world.registry_mut().get_mut(id).unwrap().position = position;
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-3
    }

    #[test]
    fn movement_integrates_velocity() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::moving(Vec2::new(1.0, 0.0)));

        world.step(0.1);

        let player = world.player(id).unwrap();
        assert!(approx(player.position.x, 420.0));
        assert!(approx(player.position.y, 300.0));
    }

    #[test]
    fn movement_clamped_to_arena() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::moving(Vec2::new(-1.0, 1.0)));

        for _ in 0..100 {
            world.step(0.05);
        }

        assert_eq!(world.player(id).unwrap().position, Vec2::new(0.0, 600.0));
    }

    #[test]
    fn fire_spawns_one_projectile_and_clears_edge() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::firing(Vec2::new(1.0, 0.0)));

        let events = world.step(0.01);

        assert_eq!(world.projectiles().len(), 1);
        let bullet = &world.projectiles()[0];
        assert_eq!(bullet.owner, id);
        assert_eq!(bullet.id, BULLET_ID_BASE);
        assert_eq!(bullet.velocity, Vec2::new(400.0, 0.0));
        assert!(approx(bullet.lifetime, 2.0 - 0.01));
        assert!(approx(bullet.position.x, 404.0));
        assert!(matches!(events[0], GameEvent::ProjectileFired { owner_id, .. } if owner_id == id));
        assert!(!world.registry().intent(id).unwrap().fire);

        world.step(0.5);
        assert_eq!(world.projectiles().len(), 1);
    }

    #[test]
    fn projectile_ids_stay_above_player_ids() {
        let mut world = World::default();
        let id = world.register();
        world.next_projectile_id = u32::MAX;

        world.set_intent(id, ClientIntent::firing(Vec2::X));
        world.step(0.01);
        world.set_intent(id, ClientIntent::firing(Vec2::X));
        world.step(world.config.fire_cooldown);

        let ids: Vec<u32> = world.projectiles().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![u32::MAX, BULLET_ID_BASE]);
        assert!(BULLET_ID_BASE > u32::MAX / 2);
    }

    #[test]
    fn cooldown_blocks_rapid_fire() {
        let mut world = World::default();
        let id = world.register();

        world.set_intent(id, ClientIntent::firing(Vec2::X));
        world.step(0.01);
        world.set_intent(id, ClientIntent::firing(Vec2::X));
        world.step(0.1);
        assert_eq!(world.projectiles().len(), 1);

        world.step(0.25);
        world.set_intent(id, ClientIntent::firing(Vec2::X));
        world.step(0.01);
        assert_eq!(world.projectiles().len(), 2);
        assert!(world.player(id).unwrap().cooldown >= 0.0);
    }

    #[test]
    fn degenerate_aim_fires_up() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::firing(Vec2::ZERO));

        world.step(0.0);

        assert_eq!(world.projectiles()[0].velocity, Vec2::new(0.0, -400.0));
    }

    #[test]
    fn lifetime_decreases_until_expiry() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::firing(Vec2::NEG_Y));
        world.step(0.0);

        let mut last = world.projectiles()[0].lifetime;
        let mut ticks = 0;
        while let Some(bullet) = world.projectiles().first() {
            assert!(bullet.lifetime < last || ticks == 0);
            last = bullet.lifetime;
            world.step(0.1);
            ticks += 1;
            assert!(ticks <= 21);
        }

        let kf = world.keyframe(0.0);
        assert!(kf.entities.iter().all(|e| e.is_player()));
    }

    #[test]
    fn projectile_hits_other_player_once() {
        let mut world = World::default();
        let shooter = world.register();
        let target = world.register();
        place(&mut world, target, Vec2::new(415.0, 300.0));
        world.set_intent(shooter, ClientIntent::firing(Vec2::X));

        let events = world.step(0.01);

        assert_eq!(world.player(target).unwrap().health, 90);
        assert_eq!(world.player(shooter).unwrap().health, 100);
        assert!(world.projectiles().is_empty());
        assert!(events.contains(&GameEvent::DamageDealt {
            attacker_id: shooter,
            target_id: target,
            projectile_id: BULLET_ID_BASE,
            remaining_health: 90,
        }));

        for _ in 0..10 {
            world.step(0.05);
        }
        assert_eq!(world.player(target).unwrap().health, 90);
    }

    #[test]
    fn owner_is_never_hit() {
        let mut world = World::default();
        let shooter = world.register();
        world.set_intent(shooter, ClientIntent::firing(Vec2::X));

        world.step(0.001);

        assert_eq!(world.player(shooter).unwrap().health, 100);
        assert_eq!(world.projectiles().len(), 1);
    }

    #[test]
    fn lowest_id_wins_overlapping_hit() {
        let mut world = World::default();
        let shooter = world.register();
        let first = world.register();
        let second = world.register();
        place(&mut world, shooter, Vec2::new(100.0, 100.0));
        place(&mut world, first, Vec2::new(110.0, 100.0));
        place(&mut world, second, Vec2::new(110.0, 100.0));
        world.set_intent(shooter, ClientIntent::firing(Vec2::X));

        world.step(0.0);

        assert_eq!(world.player(first).unwrap().health, 90);
        assert_eq!(world.player(second).unwrap().health, 100);
    }

    #[test]
    fn dead_players_are_not_hit_again() {
        let mut world = World::default();
        let shooter = world.register();
        let target = world.register();
        place(&mut world, target, Vec2::new(410.0, 300.0));
        world.registry_mut().get_mut(target).unwrap().health = 10;

        world.set_intent(shooter, ClientIntent::firing(Vec2::X));
        let events = world.step(0.0);
        assert!(events.contains(&GameEvent::PlayerDeath {
            player_id: target,
            killer_id: shooter,
        }));

        let dead = world.player(target).unwrap();
        assert_eq!(dead.health, 0);
        assert!(dead.is_dead());

        world.step(0.3);
        world.set_intent(shooter, ClientIntent::firing(Vec2::X));
        world.step(0.0);
        assert_eq!(world.player(target).unwrap().health, 0);
        assert_eq!(world.projectiles().len(), 1);

        let kf = world.keyframe(1.0);
        assert_eq!(kf.entity(target).and_then(EntitySnapshot::health), Some(0));
    }

    #[test]
    fn keyframe_lists_players_then_bullets() {
        let mut world = World::default();
        let a = world.register();
        let b = world.register();
        world.set_name(a, "Ada");
        place(&mut world, a, Vec2::new(100.0, 100.0));
        world.set_intent(b, ClientIntent::firing(Vec2::NEG_Y));
        world.step(0.0);

        let kf = world.keyframe(5.0);

        assert_eq!(kf.time, 5.0);
        assert_eq!(kf.entities.len(), 3);
        assert_eq!(kf.entities[0].id, a);
        assert_eq!(kf.entities[0].name(), Some("Ada"));
        assert_eq!(kf.entities[1].id, b);
        assert!(!kf.entities[2].is_player());
    }

    #[test]
    fn negative_dt_is_ignored() {
        let mut world = World::default();
        let id = world.register();
        world.set_intent(id, ClientIntent::moving(Vec2::X));

        world.step(-1.0);
        world.step(f32::NAN);

        assert_eq!(world.player(id).unwrap().position, Vec2::new(400.0, 300.0));
    }
}
