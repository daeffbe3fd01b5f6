// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Producer/consumer flows against a store that outlives each "boot".

use std::sync::Arc;

use super::{memory, open_ring, FlakyStore, NS};
use crate::kv::SharedStore;
use crate::record::{peek_index, EventRecord};
use crate::ring::{PeekedRecord, RingBuffer};
use crate::sequence::SequenceTracker;

fn boot(store: &SharedStore) -> (RingBuffer, SequenceTracker) {
    let ring = open_ring(store, 32);
    let tracker = SequenceTracker::open(store.clone(), NS, "seq_state").unwrap();
    (ring, tracker)
}

fn produce(ring: &mut RingBuffer, tracker: &mut SequenceTracker, payload: &[u8]) -> i64 {
    let index = tracker.next_index().unwrap();
    ring.put(&EventRecord::new(index, payload.to_vec()).encode()).unwrap();
    index
}

fn batch_indices(records: &[PeekedRecord]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| match r {
            PeekedRecord::Data(bytes) => peek_index(bytes),
            PeekedRecord::Unreadable { .. } => None,
        })
        .collect()
}

#[test]
fn test_batch_of_ten_from_fifteen() {
    let (_, store) = memory();
    let (mut ring, mut tracker) = boot(&store);
    for i in 0..15u8 {
        produce(&mut ring, &mut tracker, &[i]);
    }

    let batch = ring.peek_batch(10).unwrap();
    let indices = batch_indices(&batch.records);
    assert_eq!(indices, (1..=10).collect::<Vec<_>>());

    // Acked: commit then move the watermark to the batch high-water mark.
    assert_eq!(ring.commit_batch(&batch.ticket).unwrap(), 10);
    tracker.advance_delivered(*indices.iter().max().unwrap()).unwrap();
    assert_eq!(ring.size(), 5);
    assert_eq!(tracker.last_durable_index(), 10);
}

#[test]
fn test_failed_send_leaves_batch_queued() {
    let (_, store) = memory();
    let (mut ring, mut tracker) = boot(&store);
    for i in 0..4u8 {
        produce(&mut ring, &mut tracker, &[i]);
    }

    let first = ring.peek_batch(10).unwrap();
    ring.abort();
    assert_eq!(ring.size(), 4);

    let retry = ring.peek_batch(10).unwrap();
    assert_eq!(retry.records, first.records);
}

#[test]
fn test_crash_before_commit_redelivers() {
    let (_, store) = memory();
    {
        let (mut ring, mut tracker) = boot(&store);
        for i in 0..3u8 {
            produce(&mut ring, &mut tracker, &[i]);
        }
        let _in_flight = ring.peek_batch(10).unwrap();
    }

    let (ring, mut tracker) = boot(&store);
    assert_eq!(ring.size(), 3);
    let batch = ring.peek_batch(10).unwrap();
    assert_eq!(batch_indices(&batch.records), vec![1, 2, 3]);
    assert_eq!(tracker.next_index().unwrap(), 4);
}

#[test]
fn test_crash_between_watermark_and_commit_is_deduplicated() {
    let (_, store) = memory();
    {
        let (mut ring, mut tracker) = boot(&store);
        for i in 0..3u8 {
            produce(&mut ring, &mut tracker, &[i]);
        }
        let batch = ring.peek_batch(2).unwrap();
        let high = *batch_indices(&batch.records).iter().max().unwrap();
        tracker.advance_delivered(high).unwrap();
        // Power lost before the ring commit.
    }

    let (mut ring, tracker) = boot(&store);
    assert_eq!(ring.size(), 3);
    let batch = ring.peek_batch(10).unwrap();
    let fresh: Vec<i64> = batch_indices(&batch.records)
        .into_iter()
        .filter(|i| !tracker.is_delivered(*i))
        .collect();
    assert_eq!(fresh, vec![3]);

    ring.commit_batch(&batch.ticket).unwrap();
    assert!(ring.is_empty());
}

#[test]
fn test_opaque_records_flow_through() {
    let (_, store) = memory();
    let (mut ring, _) = boot(&store);
    ring.put(b"{\"legacy\":1}").unwrap();
    let batch = ring.peek_batch(10).unwrap();
    assert_eq!(batch.records, vec![PeekedRecord::Data(b"{\"legacy\":1}".to_vec())]);
    assert!(batch_indices(&batch.records).is_empty());
}

#[test]
fn test_failed_overwrite_never_marks_unsent_records_delivered() {
    let flaky = Arc::new(FlakyStore::default());
    let store: SharedStore = flaky.clone();
    let mut ring = open_ring(&store, 4);
    let mut tracker = SequenceTracker::open(store.clone(), NS, "seq_state").unwrap();
    for i in 0..4u8 {
        produce(&mut ring, &mut tracker, &[i]);
    }

    flaky.fail_on("ev_ctrl");
    let index = tracker.next_index().unwrap();
    assert!(ring.put(&EventRecord::new(index, vec![4]).encode()).is_err());
    flaky.heal();

    let mut ring = open_ring(&store, 4);
    let mut sent = Vec::new();
    while !ring.is_empty() {
        let batch = ring.peek_batch(1).unwrap();
        let indices = batch_indices(&batch.records);
        for index in &indices {
            assert!(!tracker.is_delivered(*index), "record {} skipped as delivered", index);
        }
        sent.extend(indices.iter().copied());
        ring.commit_batch(&batch.ticket).unwrap();
        if let Some(high) = indices.iter().max() {
            tracker.advance_delivered(*high).unwrap();
        }
    }
    assert_eq!(sent, vec![1, 2, 3, 4]);
}
