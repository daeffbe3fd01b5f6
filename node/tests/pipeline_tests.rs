// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use common::{Harness, FIELD, NS, TOPIC};
use telemq_core::KvStore;
use telemq_node::errors::{SyncError, TransportError};
use telemq_node::pipeline::Phase;

#[test]
fn test_full_cycle_sends_batch_cap_then_remainder() {
    let mut h = Harness::new(32, 10);
    for i in 0..15 {
        h.record(&format!("e{}", i));
    }

    assert_eq!(h.pipeline.tick(h.at(0)), Phase::AwaitAck);
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, TOPIC);
    assert_eq!(h.transport.sent_seqs(0), (1..=10).collect::<Vec<_>>());
    assert_eq!(h.ring.size(), 15);

    assert!(h.transport.ack(Ok(())));
    assert_eq!(h.pipeline.tick(h.at(1000)), Phase::AwaitWatermarkAck);
    assert_eq!(h.ring.size(), 5);
    assert_eq!(h.watermark(), 10);
    assert_eq!(h.sync.updates(), vec![(FIELD.to_string(), 10)]);

    assert!(h.sync.ack(Ok(())));
    // Watermark completion returns to Read, which immediately sends the rest.
    assert_eq!(h.pipeline.tick(h.at(2000)), Phase::AwaitAck);
    assert_eq!(h.transport.sent_seqs(1), (11..=15).collect::<Vec<_>>());
}

#[test]
fn test_failed_ack_keeps_records_and_retries_verbatim() {
    let mut h = Harness::new(16, 10);
    for i in 0..3 {
        h.record(&format!("e{}", i));
    }

    h.pipeline.tick(h.at(0));
    h.transport.ack(Err(TransportError::Rejected("503 Service Unavailable".into())));
    assert_eq!(h.pipeline.tick(h.at(10)), Phase::Read);
    assert_eq!(h.ring.size(), 3);
    assert_eq!(h.watermark(), 0);

    // Still inside the backoff window.
    assert_eq!(h.pipeline.tick(h.at(500)), Phase::Read);
    assert_eq!(h.transport.sent().len(), 1);

    assert_eq!(h.pipeline.tick(h.at(1010)), Phase::AwaitAck);
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1, sent[1].1);
}

#[test]
fn test_idles_when_disconnected_or_empty() {
    let mut h = Harness::new(8, 10);
    assert_eq!(h.pipeline.tick(h.at(0)), Phase::Read);
    assert!(h.transport.sent().is_empty());

    h.record("a");
    h.transport.set_connected(false);
    assert_eq!(h.pipeline.tick(h.at(1000)), Phase::Read);
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.ring.size(), 1);

    h.transport.set_connected(true);
    assert_eq!(h.pipeline.tick(h.at(2000)), Phase::AwaitAck);
}

#[test]
fn test_ack_after_timeout_is_stale() {
    let mut h = Harness::new(8, 10);
    h.record("a");
    h.record("b");

    h.pipeline.tick(h.at(0));
    assert_eq!(h.pipeline.tick(h.at(30_000)), Phase::Read);
    assert_eq!(h.ring.size(), 2);

    // The broker finally answers the abandoned send.
    h.transport.ack(Ok(()));
    assert_eq!(h.pipeline.tick(h.at(30_500)), Phase::Read);
    assert_eq!(h.ring.size(), 2);
    assert_eq!(h.watermark(), 0);

    assert_eq!(h.pipeline.tick(h.at(31_000)), Phase::AwaitAck);
    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(31_100));
    assert!(h.ring.lock().is_empty());
    assert_eq!(h.watermark(), 2);
}

#[test]
fn test_records_below_watermark_are_not_resent() {
    let mut h = Harness::new(16, 10);
    for i in 0..5 {
        h.record(&format!("e{}", i));
    }
    h.tracker.reconcile_remote(3).unwrap();

    h.pipeline.tick(h.at(0));
    assert_eq!(h.transport.sent_seqs(0), vec![4, 5]);
    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(100));
    assert_eq!(h.ring.size(), 0);
    assert_eq!(h.watermark(), 5);
}

#[test]
fn test_fully_delivered_batch_commits_without_send() {
    let mut h = Harness::new(16, 10);
    for i in 0..3 {
        h.record(&format!("e{}", i));
    }
    h.tracker.reconcile_remote(3).unwrap();

    assert_eq!(h.pipeline.tick(h.at(0)), Phase::Read);
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.ring.size(), 0);
}

#[test]
fn test_watermark_failure_does_not_undo_commit() {
    let mut h = Harness::new(8, 10);
    h.record("a");
    h.record("b");

    h.pipeline.tick(h.at(0));
    h.transport.ack(Ok(()));
    assert_eq!(h.pipeline.tick(h.at(100)), Phase::AwaitWatermarkAck);

    h.sync.ack(Err(SyncError::Network("connection reset".into())));
    assert_eq!(h.pipeline.tick(h.at(200)), Phase::Read);
    assert_eq!(h.ring.size(), 0);
    assert_eq!(h.watermark(), 2);
}

#[test]
fn test_watermark_timeout_returns_to_read() {
    let mut h = Harness::new(8, 10);
    h.record("a");
    h.pipeline.tick(h.at(0));
    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(100));

    assert_eq!(h.pipeline.tick(h.at(30_100)), Phase::Read);
    // Late sync completion is ignored.
    h.sync.ack(Ok(()));
    assert_eq!(h.pipeline.tick(h.at(30_200)), Phase::Read);
    assert_eq!(h.watermark(), 1);
}

#[test]
fn test_topic_change_discards_inflight_batch() {
    let mut h = Harness::new(8, 10);
    for i in 0..3 {
        h.record(&format!("old{}", i));
    }
    assert_eq!(h.pipeline.tick(h.at(0)), Phase::AwaitAck);

    h.pipeline.quiesce();
    {
        let mut ring = h.ring.lock();
        h.tracker.on_topic_changed(50, &mut ring).unwrap();
    }
    h.pipeline.set_topic("dev/events-v2".to_string());

    h.transport.ack(Ok(()));
    assert_eq!(h.pipeline.tick(h.at(100)), Phase::Read);
    assert_eq!(h.ring.size(), 0);
    assert_eq!(h.watermark(), 50);

    assert_eq!(h.record("new"), 51);
    assert_eq!(h.pipeline.tick(h.at(200)), Phase::AwaitAck);
    let sent = h.transport.sent();
    assert_eq!(sent[1].0, "dev/events-v2");
    assert_eq!(h.transport.sent_seqs(1), vec![51]);
}

#[test]
fn test_eviction_during_await_ack_commits_only_survivors() {
    let mut h = Harness::new(4, 10);
    for i in 0..4 {
        h.record(&format!("e{}", i));
    }
    h.pipeline.tick(h.at(0));
    assert_eq!(h.transport.sent_seqs(0), vec![1, 2, 3, 4]);

    // Two new events overwrite records 1 and 2 while the batch is in flight.
    h.record("e4");
    h.record("e5");

    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(100));
    assert_eq!(h.ring.size(), 2);
    assert_eq!(h.watermark(), 4);

    h.sync.ack(Ok(()));
    h.pipeline.tick(h.at(200));
    assert_eq!(h.transport.sent_seqs(1), vec![5, 6]);
}

#[test]
fn test_unreadable_slot_is_dropped() {
    let mut h = Harness::new(8, 10);
    for i in 0..3 {
        h.record(&format!("e{}", i));
    }
    h.mem.erase(NS, "ev1").unwrap();

    h.pipeline.tick(h.at(0));
    assert_eq!(h.transport.sent_seqs(0), vec![1, 3]);
    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(100));
    assert_eq!(h.ring.size(), 0);
}

#[test]
fn test_backoff_grows_and_resets() {
    let mut h = Harness::new(8, 10);
    h.record("a");

    h.pipeline.tick(h.at(0));
    h.transport.ack(Err(TransportError::Network("down".into())));
    h.pipeline.tick(h.at(0));
    assert_eq!(h.pipeline.retry_at(), Some(h.at(1000)));

    h.pipeline.tick(h.at(1000));
    h.transport.ack(Err(TransportError::Network("down".into())));
    h.pipeline.tick(h.at(1000));
    assert_eq!(h.pipeline.retry_at(), Some(h.at(3000)));

    h.pipeline.tick(h.at(3000));
    h.transport.ack(Ok(()));
    h.pipeline.tick(h.at(3000));
    assert_eq!(h.pipeline.retry_at(), None);
    assert_eq!(h.ring.size(), 0);
}

#[test]
fn test_refused_send_backs_off() {
    let mut h = Harness::new(8, 10);
    h.record("a");
    h.transport.reject_sends(true);

    assert_eq!(h.pipeline.tick(h.at(0)), Phase::Read);
    assert_eq!(h.pipeline.retry_at(), Some(h.at(1000)));
    assert_eq!(h.ring.size(), 1);

    h.transport.reject_sends(false);
    assert_eq!(h.pipeline.tick(h.at(1000)), Phase::AwaitAck);
}
