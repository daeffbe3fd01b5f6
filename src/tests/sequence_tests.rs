// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use super::{memory, open_ring, FlakyStore, NS};
use crate::error::{QueueError, TrackerError};
use crate::kv::{KvStore, SharedStore};
use crate::sequence::{SequenceState, SequenceTracker};

fn open_tracker(store: &SharedStore) -> SequenceTracker {
    SequenceTracker::open(store.clone(), NS, "seq_state").unwrap()
}

#[test]
fn test_first_boot_persists_defaults() {
    let (mem, store) = memory();
    let tracker = open_tracker(&store);
    assert_eq!(tracker.state(), SequenceState::default());
    assert_eq!(mem.write_count(), 1);
    assert!(store.get(NS, "seq_state").unwrap().is_some());
}

#[test]
fn test_next_index_is_durable() {
    let (_, store) = memory();
    {
        let mut tracker = open_tracker(&store);
        assert_eq!(tracker.next_index().unwrap(), 1);
        assert_eq!(tracker.next_index().unwrap(), 2);
    }
    let mut tracker = open_tracker(&store);
    assert_eq!(tracker.state().last_recorded_index, 2);
    assert_eq!(tracker.next_index().unwrap(), 3);
}

#[test]
fn test_watermark_only_moves_forward() {
    let (_, store) = memory();
    let mut tracker = open_tracker(&store);
    assert!(tracker.advance_delivered(7).unwrap());
    assert!(!tracker.advance_delivered(7).unwrap());
    assert!(!tracker.advance_delivered(3).unwrap());
    assert_eq!(tracker.last_durable_index(), 7);
    assert_eq!(tracker.state().next_cursor, 8);
    assert!(tracker.is_delivered(7));
    assert!(!tracker.is_delivered(8));

    assert_eq!(open_tracker(&store).last_durable_index(), 7);
}

#[test]
fn test_mark_read_never_rewinds() {
    let (_, store) = memory();
    let mut tracker = open_tracker(&store);
    tracker.mark_read(4).unwrap();
    tracker.mark_read(2).unwrap();
    assert_eq!(tracker.state().next_cursor, 5);
}

#[test]
fn test_reconcile_remote_adopts_higher_watermark() {
    let (_, store) = memory();
    let mut tracker = open_tracker(&store);
    tracker.next_index().unwrap();
    tracker.advance_delivered(1).unwrap();

    assert!(!tracker.reconcile_remote(0).unwrap());
    assert!(tracker.reconcile_remote(40).unwrap());
    let state = tracker.state();
    assert_eq!(state.last_durable_index, 40);
    assert_eq!(state.last_recorded_index, 40);
    assert_eq!(tracker.next_index().unwrap(), 41);
}

#[test]
fn test_topic_change_resets_ring_and_cursors() {
    let (_, store) = memory();
    let mut ring = open_ring(&store, 8);
    let mut tracker = open_tracker(&store);
    for _ in 0..3 {
        let index = tracker.next_index().unwrap();
        ring.put(&index.to_le_bytes()).unwrap();
    }

    tracker.on_topic_changed(100, &mut ring).unwrap();
    assert!(ring.is_empty());
    assert_eq!(
        tracker.state(),
        SequenceState { last_durable_index: 100, next_cursor: 101, last_recorded_index: 100 }
    );
    assert_eq!(tracker.next_index().unwrap(), 101);
    assert!(open_ring(&store, 8).is_empty());
}

#[test]
fn test_corrupt_blob_starts_from_defaults() {
    let (_, store) = memory();
    {
        let mut tracker = open_tracker(&store);
        tracker.next_index().unwrap();
    }
    let mut blob = store.get(NS, "seq_state").unwrap().unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xAA;
    store.set(NS, "seq_state", &blob).unwrap();

    let tracker = open_tracker(&store);
    assert_eq!(tracker.state(), SequenceState::default());
}

#[test]
fn test_overflow_is_an_error() {
    let (_, store) = memory();
    let saturated = SequenceState { last_recorded_index: i64::MAX, ..Default::default() };
    store.set(NS, "seq_state", &saturated.encode().unwrap()).unwrap();

    let mut tracker = open_tracker(&store);
    assert!(matches!(tracker.next_index(), Err(TrackerError::Overflow)));
    assert_eq!(tracker.state().last_recorded_index, i64::MAX);
}

#[test]
fn test_failed_persist_keeps_previous_state() {
    let flaky = Arc::new(FlakyStore::default());
    let store: SharedStore = flaky.clone();
    let mut tracker = open_tracker(&store);
    tracker.advance_delivered(3).unwrap();

    flaky.fail_on("seq_state");
    assert!(matches!(tracker.advance_delivered(9), Err(TrackerError::Storage(_))));
    assert_eq!(tracker.last_durable_index(), 3);

    flaky.heal();
    assert!(tracker.advance_delivered(9).unwrap());
}

#[test]
fn test_rejects_long_key() {
    let (_, store) = memory();
    let result = SequenceTracker::open(store, NS, "sequence_state_key");
    assert!(matches!(result, Err(TrackerError::Queue(QueueError::KeyTooLong { .. }))));
}
