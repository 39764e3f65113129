use glam::Vec2;

use super::config::WorldConfig;
use super::player::{ClientIntent, Player};

#[derive(Debug)]
struct Slot {
    player: Player,
    intent: ClientIntent,
}

/// Live players keyed by their server-assigned id. Ids are handed out in
/// ascending order and never reused; slot `id - 1` holds player `id`.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<Option<Slot>>,
    next_id: u32,
    live: usize,
    spawn_position: Vec2,
    max_health: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(&WorldConfig::default())
    }
}

impl Registry {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
            live: 0,
            spawn_position: config.spawn_position,
            max_health: config.max_health,
        }
    }

    pub fn register(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let index = slot_index(id);
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(Slot {
            player: Player::new(id, self.spawn_position, self.max_health),
            intent: ClientIntent::default(),
        });
        self.live += 1;

        id
    }

    pub fn unregister(&mut self, id: u32) -> Option<Player> {
        let slot = self.slots.get_mut(slot_index(id))?.take()?;
        self.live -= 1;

        while self.slots.last().is_some_and(Option::is_none) {
            self.slots.pop();
        }

        Some(slot.player)
    }

    /// Last write wins; returns false for ids that are not registered.
    pub fn set_intent(&mut self, id: u32, intent: ClientIntent) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.intent = intent;
                true
            }
            None => false,
        }
    }

    /// Empty names are ignored.
    pub fn set_name(&mut self, id: u32, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match self.slot_mut(id) {
            Some(slot) => {
                slot.player.name = name.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.slot(id).map(|slot| &slot.player)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.slot_mut(id).map(|slot| &mut slot.player)
    }

    pub fn intent(&self, id: u32) -> Option<&ClientIntent> {
        self.slot(id).map(|slot| &slot.intent)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slot(id).is_some()
    }

    /// Players in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().flatten().map(|slot| &slot.player)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().flatten().map(|slot| &mut slot.player)
    }

    /// Players paired with their pending intent, ascending id order.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&mut Player, &mut ClientIntent)> {
        self.slots
            .iter_mut()
            .flatten()
            .map(|slot| (&mut slot.player, &mut slot.intent))
    }

    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn slot(&self, id: u32) -> Option<&Slot> {
        self.slots.get(slot_index(id))?.as_ref()
    }

    fn slot_mut(&mut self, id: u32) -> Option<&mut Slot> {
        self.slots.get_mut(slot_index(id))?.as_mut()
    }
}

fn slot_index(id: u32) -> usize {
    // Id 0 is never assigned; map it past any real slot.
    id.checked_sub(1).map_or(usize::MAX, |i| i as usize)
}
