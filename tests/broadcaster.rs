// tests/broadcaster.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::time::{Duration, Instant};

use procwarden::broadcast::{Broadcaster, BroadcasterConfig, OverflowPolicy};
use procwarden::process::OutputChunk;

fn small(history: usize, queue: usize, overflow: OverflowPolicy) -> BroadcasterConfig {
    BroadcasterConfig {
        history_capacity: history,
        queue_capacity: queue,
        overflow,
    }
}

#[test]
fn stalled_subscriber_does_not_block_writer_or_fast_reader() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(4096, 64, OverflowPolicy::DropOldest));
    let mut fast = b.subscribe("fast");
    let stalled = b.subscribe("stalled");

    let started = Instant::now();
    let mut received = Vec::new();
    for i in 0..10_000u32 {
        b.write(i.to_string());
        // The fast reader keeps up, the stalled one never reads.
        received.extend(fast.drain());
    }
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "writes took {:?}",
        started.elapsed()
    );

    let received: Vec<u32> = received.iter().map(|s| s.parse().unwrap()).collect();
    assert_eq!(received.last(), Some(&9_999));
    assert!(
        received.windows(2).all(|w| w[1] == w[0] + 1),
        "fast subscriber must see a contiguous stream"
    );
    assert_eq!(fast.dropped(), 0);

    // The stalled subscriber keeps only its newest 64 and counts the rest.
    assert_eq!(stalled.dropped(), 10_000 - 64);
}

#[tokio::test]
async fn lagging_subscriber_holds_contiguous_suffix_ending_at_latest() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(4096, 100, OverflowPolicy::DropOldest));
    let mut lagging = b.subscribe("lagging");

    for i in 0..10_000u32 {
        b.write(i.to_string());
    }

    let got: Vec<u32> = lagging.drain().iter().map(|s| s.parse().unwrap()).collect();
    assert_eq!(got.len(), 100);
    assert_eq!(got.first(), Some(&9_900));
    assert_eq!(got.last(), Some(&9_999));
    assert!(got.windows(2).all(|w| w[1] == w[0] + 1));
}

#[tokio::test]
async fn recv_wakes_up_on_write_from_another_task() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(BroadcasterConfig::default());
    let mut sub = b.subscribe("reader");

    let writer = b.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.write("hello".to_string());
    });

    let msg = with_timeout(sub.recv()).await;
    assert_eq!(msg.as_deref(), Some("hello"));
}

#[test]
fn new_subscriber_is_seeded_with_recent_history() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(3, 16, OverflowPolicy::DropOldest));
    for m in ["a", "b", "c", "d", "e"] {
        b.write(m.to_string());
    }
    assert_eq!(b.history(), vec!["c", "d", "e"]);

    let mut sub = b.subscribe("late");
    assert_eq!(sub.drain(), vec!["c", "d", "e"]);

    // Seeding is capped by the queue, keeping the newest.
    let b2: Broadcaster<String> = Broadcaster::new(small(100, 2, OverflowPolicy::DropOldest));
    for m in ["a", "b", "c"] {
        b2.write(m.to_string());
    }
    let mut sub2 = b2.subscribe("late");
    assert_eq!(sub2.drain(), vec!["b", "c"]);
}

#[test]
fn output_history_is_measured_in_bytes() {
    init_tracing();
    let b: Broadcaster<OutputChunk> = Broadcaster::new(small(10, 16, OverflowPolicy::DropOldest));
    b.write(OutputChunk::new(b"12345"));
    b.write(OutputChunk::new(b"6789"));
    b.write(OutputChunk::new(b"abc"));

    let kept: Vec<String> = b.history().iter().map(|c| c.to_string_lossy()).collect();
    assert_eq!(kept, vec!["6789", "abc"]);

    // One chunk bigger than the whole capacity is still kept on its own.
    b.write(OutputChunk::new(b"0123456789ABCDEF"));
    let kept: Vec<String> = b.history().iter().map(|c| c.to_string_lossy()).collect();
    assert_eq!(kept, vec!["0123456789ABCDEF"]);
}

#[test]
fn zero_history_capacity_keeps_nothing() {
    let b: Broadcaster<String> = Broadcaster::new(small(0, 16, OverflowPolicy::DropOldest));
    b.write("x".to_string());
    assert!(b.history().is_empty());
    let mut sub = b.subscribe("s");
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn resubscribing_an_id_closes_the_previous_handle() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(0, 16, OverflowPolicy::DropOldest));
    let mut first = b.subscribe("conn-1");
    b.write("one".to_string());

    let mut second = b.subscribe("conn-1");
    assert_eq!(b.subscriber_count(), 1);
    assert!(first.is_closed());

    b.write("two".to_string());
    // The old handle still hands out what it had queued, then ends.
    assert_eq!(first.recv().await.as_deref(), Some("one"));
    assert_eq!(first.recv().await, None);
    assert_eq!(second.recv().await.as_deref(), Some("two"));
}

#[test]
fn unsubscribe_unknown_id_is_a_noop() {
    let b: Broadcaster<String> = Broadcaster::new(BroadcasterConfig::default());
    let sub = b.subscribe("known");
    b.unsubscribe("unknown");
    assert_eq!(b.subscriber_count(), 1);
    assert!(!sub.is_closed());

    b.unsubscribe("known");
    assert_eq!(b.subscriber_count(), 0);
    assert!(sub.is_closed());
}

#[test]
fn dropped_subscription_is_pruned_on_next_write() {
    let b: Broadcaster<String> = Broadcaster::new(BroadcasterConfig::default());
    let sub = b.subscribe("gone");
    let _kept = b.subscribe("kept");
    drop(sub);
    assert_eq!(b.subscriber_count(), 2);

    b.write("x".to_string());
    assert_eq!(b.subscriber_count(), 1);
}

#[tokio::test]
async fn disconnect_policy_closes_lagging_subscriber() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(0, 2, OverflowPolicy::Disconnect));
    let mut slow = b.subscribe("slow");
    let mut fast = b.subscribe("fast");

    for m in ["1", "2", "3", "4"] {
        b.write(m.to_string());
        fast.drain();
    }

    assert!(slow.is_closed());
    assert_eq!(b.subscriber_count(), 1);
    assert_eq!(slow.recv().await.as_deref(), Some("1"));
    assert_eq!(slow.recv().await.as_deref(), Some("2"));
    assert_eq!(slow.recv().await, None);
    assert!(!fast.is_closed());
}

#[tokio::test]
async fn close_all_ends_every_stream_but_keeps_history() {
    init_tracing();
    let b: Broadcaster<String> = Broadcaster::new(small(4096, 16, OverflowPolicy::DropOldest));
    let mut first = b.subscribe("first");
    let mut second = b.subscribe("second");
    b.write("a".to_string());
    b.write("b".to_string());

    b.close_all();
    assert_eq!(b.subscriber_count(), 0);

    // Queued items are still delivered before the end of stream.
    assert_eq!(with_timeout(first.recv()).await.as_deref(), Some("a"));
    assert_eq!(with_timeout(first.recv()).await.as_deref(), Some("b"));
    assert_eq!(with_timeout(first.recv()).await, None);
    assert!(first.is_closed());
    assert_eq!(second.drain(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(with_timeout(second.recv()).await, None);

    // Writes after the close only reach history.
    b.write("c".to_string());
    assert_eq!(b.history(), vec!["a", "b", "c"]);
    let mut late = b.subscribe("late");
    assert_eq!(late.drain(), vec!["a", "b", "c"]);
}
