// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! telemq-core: a flash-friendly persistent event queue.
//!
//! The crate owns the storage side of the delivery pipeline:
//! - [`ring::RingBuffer`]: capacity-bounded FIFO of opaque records over a [`kv::KvStore`]
//! - [`sequence::SequenceTracker`]: persisted produce/read/delivered cursors
//! - [`record::EventRecord`]: envelope carrying the sequence index next to the payload
//!
//! Transports, watermark sync and the polling task live in `telemq-node`.

pub mod config;
pub mod error;
pub mod kv;
pub mod record;
pub mod ring;
pub mod sequence;

pub use error::{QueueError, QueueResult, RecordError, StorageError, TrackerError, TrackerResult};
pub use kv::{KvStore, KvStoreExt, MemoryStore, SharedStore};
pub use record::EventRecord;
pub use ring::{
    BatchTicket, PeekedBatch, PeekedRecord, PutOutcome, RingBuffer, RingOptions, RingStatus,
    SharedRing,
};
pub use sequence::{SequenceState, SequenceTracker};

#[cfg(test)]
mod tests;
