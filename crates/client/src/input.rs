use std::time::{Duration, Instant};

use glam::Vec2;

use skirmish::ClientIntent;

/// Terminals report presses and auto-repeats but no releases, so a held
/// direction counts as released once it has gone this long without a repeat.
pub const HOLD_DECAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Left,
    Right,
    Up,
    Down,
}

impl Heading {
    fn index(self) -> usize {
        match self {
            Heading::Left => 0,
            Heading::Right => 1,
            Heading::Up => 2,
            Heading::Down => 3,
        }
    }

    /// Arena space: y grows downwards.
    fn vector(self) -> Vec2 {
        match self {
            Heading::Left => Vec2::NEG_X,
            Heading::Right => Vec2::X,
            Heading::Up => Vec2::NEG_Y,
            Heading::Down => Vec2::Y,
        }
    }
}

const HEADINGS: [Heading; 4] = [Heading::Left, Heading::Right, Heading::Up, Heading::Down];

#[derive(Debug, Clone)]
pub struct InputState {
    last_seen: [Option<Instant>; 4],
    fire_requested: bool,
    facing: Vec2,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            last_seen: [None; 4],
            fire_requested: false,
            facing: Vec2::NEG_Y,
        }
    }
}

impl InputState {
    pub fn press(&mut self, heading: Heading, now: Instant) {
        self.last_seen[heading.index()] = Some(now);
    }

    pub fn fire(&mut self) {
        self.fire_requested = true;
    }

    pub fn facing(&self) -> Vec2 {
        self.facing
    }

    pub fn movement(&self, now: Instant) -> Vec2 {
        HEADINGS
            .iter()
            .filter(|heading| {
                self.last_seen[heading.index()]
                    .is_some_and(|seen| now.saturating_duration_since(seen) < HOLD_DECAY)
            })
            .map(|heading| heading.vector())
            .sum()
    }

    /// Intent to send this frame. Consumes a pending fire request, aimed
    /// along the most recent movement direction.
    pub fn to_intent(&mut self, now: Instant) -> ClientIntent {
        let movement = self.movement(now);
        if movement != Vec2::ZERO {
            self.facing = movement.normalize();
        }

        ClientIntent {
            movement,
            fire: std::mem::take(&mut self.fire_requested),
            aim: self.facing,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_combine() {
        let now = Instant::now();
        let mut input = InputState::default();
        input.press(Heading::Right, now);
        input.press(Heading::Down, now);

        let intent = input.to_intent(now);
        assert_eq!(intent.movement, Vec2::new(1.0, 1.0));
        assert!(!intent.fire);
    }

    #[test]
    fn held_keys_decay() {
        let now = Instant::now();
        let mut input = InputState::default();
        input.press(Heading::Left, now);

        assert_eq!(input.movement(now + Duration::from_millis(100)), Vec2::NEG_X);
        assert_eq!(input.movement(now + HOLD_DECAY), Vec2::ZERO);
    }

    #[test]
    fn fire_aims_along_last_movement() {
        let now = Instant::now();
        let mut input = InputState::default();
        assert_eq!(input.facing(), Vec2::NEG_Y);

        input.press(Heading::Left, now);
        input.to_intent(now);

        input.fire();
        let intent = input.to_intent(now + Duration::from_secs(1));
        assert!(intent.fire);
        assert_eq!(intent.movement, Vec2::ZERO);
        assert_eq!(intent.aim, Vec2::NEG_X);

        // The request is consumed by the frame that sends it.
        assert!(!input.to_intent(now + Duration::from_secs(1)).fire);
    }
}
