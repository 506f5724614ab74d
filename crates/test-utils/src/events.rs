//! Helpers for asserting on the global event stream.

use std::time::Duration;

use procwarden::broadcast::Subscription;
use procwarden::event::Event;

/// Records event messages as they arrive and waits for expected ones.
pub struct EventLog {
    sub: Subscription<Event>,
    seen: Vec<String>,
}

impl EventLog {
    /// Wrap `sub`, discarding whatever history it was seeded with.
    pub fn new(mut sub: Subscription<Event>) -> Self {
        sub.drain();
        Self {
            sub,
            seen: Vec::new(),
        }
    }

    /// Every message received so far, in order.
    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    /// Next message, or `None` if nothing arrives within `wait`.
    pub async fn next_within(&mut self, wait: Duration) -> Option<String> {
        let msg = tokio::time::timeout(wait, self.sub.recv())
            .await
            .ok()
            .flatten()?;
        self.seen.push(msg.message.clone());
        Some(msg.message)
    }

    /// Read until `message` arrives (panics after 10s).
    pub async fn wait_for(&mut self, message: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_within(left).await {
                Some(m) if m == message => return,
                Some(_) => {}
                None => panic!(
                    "timed out waiting for {message:?}; saw {:?}",
                    self.seen
                ),
            }
        }
    }

    /// Read until every message in `expected` has arrived (repeats count),
    /// then assert that those messages arrived in exactly that order.
    ///
    /// Unrelated messages interleaved in between are allowed.
    pub async fn expect_sequence(&mut self, expected: &[&str]) {
        let start = self.seen.len();
        for (i, message) in expected.iter().enumerate() {
            let needed = expected[..=i].iter().filter(|m| *m == message).count();
            while self.seen[start..].iter().filter(|m| m == message).count() < needed {
                self.wait_for(message).await;
            }
        }
        let got: Vec<&str> = self.seen[start..]
            .iter()
            .map(String::as_str)
            .filter(|m| expected.contains(m))
            .collect();
        assert_eq!(got, expected, "full log: {:?}", &self.seen[start..]);
    }

    /// Assert nothing arrives within `wait`.
    pub async fn assert_quiet(&mut self, wait: Duration) {
        if let Some(m) = self.next_within(wait).await {
            panic!("expected no events, got {m:?}");
        }
    }
}
