use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::net::{EntitySnapshot, Keyframe};

pub const DEFAULT_CAPACITY: usize = 120;
pub const DEFAULT_INTERPOLATION_DELAY: Duration = Duration::from_millis(120);

#[derive(Debug)]
struct Frames {
    frames: VecDeque<Keyframe>,
    capacity: usize,
    delay: Duration,
}

/// Bounded FIFO of received keyframes with a delayed interpolation query.
///
/// Shared between the network thread (`push`) and whoever renders
/// (`sample`), so every method locks internally and takes `&self`.
#[derive(Debug)]
pub struct SnapshotBuffer {
    inner: Mutex<Frames>,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_INTERPOLATION_DELAY)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize, delay: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Frames {
                frames: VecDeque::with_capacity(capacity),
                capacity,
                delay,
            }),
        }
    }

    /// Appends in arrival order; the oldest frame is evicted once full.
    pub fn push(&self, keyframe: Keyframe) {
        let mut inner = self.inner.lock();
        inner.frames.push_back(keyframe);
        while inner.frames.len() > inner.capacity {
            inner.frames.pop_front();
        }
    }

    /// Entity states at render time `now - delay`, keyed by id.
    ///
    /// Brackets the render time with the latest frame at or before it and
    /// the frame right after, then lerps x/y of entities present in both.
    /// Entities seen in only one frame pass through untouched. Outside the
    /// buffered range the nearest frame is returned as is.
    pub fn sample(&self, now: f64) -> HashMap<u32, EntitySnapshot> {
        let inner = self.inner.lock();
        let target = now - inner.delay.as_secs_f64();

        let mut before: Option<&Keyframe> = None;
        let mut after: Option<&Keyframe> = None;
        for frame in &inner.frames {
            if frame.time <= target {
                before = Some(frame);
            } else {
                after = Some(frame);
                break;
            }
        }

        let (Some(a), Some(b)) = (
            before.or_else(|| inner.frames.front()),
            after.or_else(|| inner.frames.back()),
        ) else {
            return HashMap::new();
        };

        if std::ptr::eq(a, b) {
            return by_id(a);
        }

        let span = b.time - a.time;
        let alpha = if span <= 0.0 {
            1.0
        } else {
            ((target - a.time) / span) as f32
        };

        let b_entities: HashMap<u32, &EntitySnapshot> =
            b.entities.iter().map(|e| (e.id, e)).collect();

        let mut result = HashMap::with_capacity(a.entities.len().max(b.entities.len()));
        for from in &a.entities {
            let sampled = match b_entities.get(&from.id) {
                Some(to) => EntitySnapshot {
                    x: from.x + (to.x - from.x) * alpha,
                    y: from.y + (to.y - from.y) * alpha,
                    ..from.clone()
                },
                None => from.clone(),
            };
            result.insert(from.id, sampled);
        }
        for to in &b.entities {
            result.entry(to.id).or_insert_with(|| to.clone());
        }

        result
    }

    /// `sample` against the local wall clock.
    pub fn sample_now(&self) -> HashMap<u32, EntitySnapshot> {
        self.sample(crate::net::unix_time_secs())
    }

    pub fn latest(&self) -> Option<Keyframe> {
        self.inner.lock().frames.back().cloned()
    }

    pub fn delay(&self) -> Duration {
        self.inner.lock().delay
    }

    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = delay;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /// Drops every frame and keeps the delay.
    pub fn clear(&self) {
        self.inner.lock().frames.clear();
    }
}

fn by_id(frame: &Keyframe) -> HashMap<u32, EntitySnapshot> {
    frame.entities.iter().map(|e| (e.id, e.clone())).collect()
}
