mod buffer;

pub use buffer::{DEFAULT_CAPACITY, DEFAULT_INTERPOLATION_DELAY, SnapshotBuffer};
