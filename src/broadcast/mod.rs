// src/broadcast/mod.rs

//! Bounded fan-out used for the global event stream and for per-program
//! output.
//!
//! The writer never waits on a reader. Each subscriber owns a bounded queue;
//! what happens when that queue is full is decided by [`OverflowPolicy`]:
//!
//! - `DropOldest` (default): the lagging subscriber loses its oldest queued
//!   message, so it always holds a contiguous, most-recent slice of the
//!   stream. Losses are counted in [`Subscription::dropped`].
//! - `Disconnect`: the lagging subscriber is closed and removed.

pub mod broadcaster;
pub mod queue;

pub use broadcaster::Broadcaster;
pub use queue::Subscription;

/// Default history capacity (messages for events, bytes for output).
pub const DEFAULT_HISTORY_CAPACITY: usize = 4096;

/// Default per-subscriber queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    Disconnect,
}

#[derive(Debug, Clone, Copy)]
pub struct BroadcasterConfig {
    /// Total weight of replay history kept for new subscribers.
    pub history_capacity: usize,
    /// Messages buffered per subscriber before the overflow policy applies.
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// How much of the history capacity a message uses up.
pub trait Weighted {
    fn weight(&self) -> usize {
        1
    }
}

impl Weighted for String {}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}
