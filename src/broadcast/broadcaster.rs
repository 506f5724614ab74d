// src/broadcast/broadcaster.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use super::queue::{Push, Queue, Subscription};
use super::{BroadcasterConfig, OverflowPolicy, Weighted};
use crate::sync::lock;

struct State<T> {
    history: VecDeque<T>,
    history_weight: usize,
    subscribers: HashMap<String, Arc<Queue<T>>>,
}

struct Inner<T> {
    config: BroadcasterConfig,
    state: Mutex<State<T>>,
}

/// One writer, many readers, bounded replay.
///
/// - `write` appends to the history ring and offers the message to every
///   subscriber queue without waiting; a full queue is handled by the
///   configured [`OverflowPolicy`] and never affects other subscribers.
/// - `subscribe` seeds the new queue with the most recent history.
///
/// Cloning is cheap and shares the same history and subscriber map.
pub struct Broadcaster<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Broadcaster")
            .field("config", &self.inner.config)
            .field("history_len", &state.history.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl<T: Clone + Weighted> Broadcaster<T> {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    history: VecDeque::new(),
                    history_weight: 0,
                    subscribers: HashMap::new(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.inner.config
    }

    /// Record `msg` and deliver it to every current subscriber.
    pub fn write(&self, msg: T) {
        let targets: Vec<(String, Arc<Queue<T>>)> = {
            let mut state = lock(&self.inner.state);
            self.remember(&mut state, msg.clone());
            state
                .subscribers
                .iter()
                .map(|(id, queue)| (id.clone(), Arc::clone(queue)))
                .collect()
        };

        let policy = self.inner.config.overflow;
        let mut stale: Vec<(String, Arc<Queue<T>>)> = Vec::new();

        for (id, queue) in targets {
            match queue.push(msg.clone(), policy) {
                Push::Delivered => {}
                Push::Evicted => {
                    trace!(subscriber = %id, "subscriber lagging; evicted oldest queued message");
                }
                Push::Overflow => {
                    debug!(subscriber = %id, "subscriber queue full; disconnecting");
                    queue.close();
                    stale.push((id, queue));
                }
                Push::Closed => stale.push((id, queue)),
            }
        }

        if !stale.is_empty() {
            let mut state = lock(&self.inner.state);
            for (id, queue) in stale {
                // Only forget the exact queue we saw; the id may have been
                // re-subscribed in the meantime.
                if state
                    .subscribers
                    .get(&id)
                    .is_some_and(|current| Arc::ptr_eq(current, &queue))
                {
                    state.subscribers.remove(&id);
                }
            }
        }
    }

    /// Register `id`, replacing (and closing) any previous subscription with
    /// the same id.
    pub fn subscribe(&self, id: impl Into<String>) -> Subscription<T> {
        let id = id.into();
        let queue = Arc::new(Queue::new(self.inner.config.queue_capacity));

        let previous = {
            let mut state = lock(&self.inner.state);
            let skip = state.history.len().saturating_sub(queue.capacity());
            for item in state.history.iter().skip(skip) {
                queue.push(item.clone(), OverflowPolicy::DropOldest);
            }
            state.subscribers.insert(id.clone(), Arc::clone(&queue))
        };

        if let Some(previous) = previous {
            debug!(subscriber = %id, "replacing existing subscription");
            previous.close();
        }

        Subscription::new(id, queue)
    }

    /// Remove `id`; a no-op when it isn't registered.
    pub fn unsubscribe(&self, id: &str) {
        let removed = lock(&self.inner.state).subscribers.remove(id);
        if let Some(queue) = removed {
            queue.close();
        }
    }

    /// Close and forget every subscription. Readers drain what they had
    /// queued, then `recv` returns `None`. History is kept.
    pub fn close_all(&self) {
        let closed: Vec<Arc<Queue<T>>> = lock(&self.inner.state)
            .subscribers
            .drain()
            .map(|(_, queue)| queue)
            .collect();
        if !closed.is_empty() {
            debug!(subscribers = closed.len(), "closing all subscriptions");
        }
        for queue in closed {
            queue.close();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).subscribers.len()
    }

    /// Copy of the replay history, oldest first.
    pub fn history(&self) -> Vec<T> {
        lock(&self.inner.state).history.iter().cloned().collect()
    }

    fn remember(&self, state: &mut State<T>, msg: T) {
        let capacity = self.inner.config.history_capacity;
        if capacity == 0 {
            return;
        }
        state.history_weight += msg.weight();
        state.history.push_back(msg);
        // A single message heavier than the whole capacity is still kept.
        while state.history_weight > capacity && state.history.len() > 1 {
            if let Some(old) = state.history.pop_front() {
                state.history_weight -= old.weight();
            }
        }
    }
}
