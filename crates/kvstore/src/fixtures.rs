// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Populated stores for tool tests.
use std::path::Path;
use std::sync::Arc;

use telemq_core::config::{
    DEFAULT_CONTROL_KEY, DEFAULT_NAMESPACE, DEFAULT_RING_PREFIX, DEFAULT_SEQUENCE_KEY,
};
use telemq_core::{
    EventRecord, RingBuffer, RingOptions, SequenceTracker, SharedStore, TrackerResult,
};

use crate::store::FileStore;

pub const FIXTURE_PARTITION: &str = "nvs";
pub const FIXTURE_CAPACITY: u16 = 8;

pub struct FixtureSummary {
    pub queued: u16,
    pub watermark: i64,
    pub last_recorded: i64,
}

/// Writes a queue with five recorded events (two of them delivered) plus one opaque record.
pub fn generate_test_store(dir: &Path) -> TrackerResult<FixtureSummary> {
    let store: SharedStore = Arc::new(FileStore::open(dir, FIXTURE_PARTITION)?);
    let mut ring = RingBuffer::open(
        store.clone(),
        RingOptions::new(
            DEFAULT_NAMESPACE,
            DEFAULT_RING_PREFIX,
            DEFAULT_CONTROL_KEY,
            FIXTURE_CAPACITY,
        ),
    )?;
    let mut tracker = SequenceTracker::open(store, DEFAULT_NAMESPACE, DEFAULT_SEQUENCE_KEY)?;

    for i in 1..=5 {
        let index = tracker.next_index()?;
        let payload = format!("event_payload_{}", i).into_bytes();
        ring.put(&EventRecord::new(index, payload).encode())?;
    }
    ring.put(b"opaque")?;

    ring.commit_n(2)?;
    tracker.advance_delivered(2)?;

    let state = tracker.state();
    Ok(FixtureSummary {
        queued: ring.size(),
        watermark: state.last_durable_index,
        last_recorded: state.last_recorded_index,
    })
}
