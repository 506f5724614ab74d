// src/broadcast/queue.rs

//! Per-subscriber bounded queue and the receiving handle built on it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::OverflowPolicy;
use crate::sync::lock;

/// Result of a single non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Push {
    Delivered,
    /// Delivered after evicting the oldest queued entry.
    Evicted,
    /// Queue full under `Disconnect`; nothing was queued.
    Overflow,
    /// Receiver is gone.
    Closed,
}

#[derive(Debug)]
struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
    dropped: u64,
}

#[derive(Debug)]
pub(crate) struct Queue<T> {
    slots: Mutex<Slots<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> Queue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue without ever waiting on the consumer.
    pub(crate) fn push(&self, item: T, policy: OverflowPolicy) -> Push {
        let outcome = {
            let mut slots = lock(&self.slots);
            if slots.closed {
                return Push::Closed;
            }
            if slots.items.len() < self.capacity {
                slots.items.push_back(item);
                Push::Delivered
            } else {
                match policy {
                    OverflowPolicy::DropOldest => {
                        slots.items.pop_front();
                        slots.dropped += 1;
                        slots.items.push_back(item);
                        Push::Evicted
                    }
                    OverflowPolicy::Disconnect => Push::Overflow,
                }
            }
        };
        if outcome != Push::Overflow {
            self.notify.notify_one();
        }
        outcome
    }

    pub(crate) fn close(&self) {
        lock(&self.slots).closed = true;
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.slots).closed
    }
}

/// Receiving side of one broadcaster subscription.
///
/// Items arrive in write order. Once the subscription is closed (by
/// `unsubscribe`, by re-subscribing the same id, or by the `Disconnect`
/// overflow policy) the remaining queued items are still handed out, then
/// `recv` returns `None`.
///
/// Dropping the handle closes the queue; the broadcaster forgets it on its
/// next write.
pub struct Subscription<T> {
    id: String,
    queue: Arc<Queue<T>>,
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("capacity", &self.queue.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: String, queue: Arc<Queue<T>>) -> Self {
        Self { id, queue }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next item; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut slots = lock(&self.queue.slots);
                if let Some(item) = slots.items.pop_front() {
                    return Some(item);
                }
                if slots.closed {
                    return None;
                }
            }
            self.queue.notify.notified().await;
        }
    }

    /// Take the next item if one is queued.
    pub fn try_recv(&mut self) -> Option<T> {
        lock(&self.queue.slots).items.pop_front()
    }

    /// Take everything queued right now.
    pub fn drain(&mut self) -> Vec<T> {
        lock(&self.queue.slots).items.drain(..).collect()
    }

    /// Items evicted from this queue because the reader fell behind.
    pub fn dropped(&self) -> u64 {
        lock(&self.queue.slots).dropped
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.queue.close();
    }
}
