// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Persistent Ring Buffer
//!
//! A capacity-bounded FIFO of opaque records stored in a [`KvStore`].
//!
//! # Persisted state
//! - `control_key`: [`ControlWord`] (head, tail, full)
//! - `control_key + "_cap"`: capacity as `u16`
//! - `prefix + slot`: record bytes, one entry per slot
//!
//! # Write ordering
//! 1. Record bytes are written to the slot
//! 2. The new control word is written in a single `set`
//! 3. In-memory pointers are updated only after step 2 succeeds
//!
//! A crash between any two steps leaves the control word pointing at data that was
//! written by some earlier successful operation. A full ring overwrites its oldest
//! record instead of rejecting the producer.
//!
//! # Reads
//! `peek` never moves the tail. The consumer calls `commit` once the record has been
//! handed off, or `abort` to leave it queued for a retry.

pub mod control;
pub mod shared;

use serde::Serialize;

use crate::config::{CAPACITY_KEY_SUFFIX, MAX_KEY_LEN, MAX_RECORD_SIZE};
use crate::error::{QueueError, QueueResult, StorageError};
use crate::kv::{KvStoreExt, SharedStore};

pub use control::{ControlError, ControlWord};
pub use shared::SharedRing;

/// Parameters for [`RingBuffer::open`].
#[derive(Debug, Clone)]
pub struct RingOptions {
    pub namespace: String,
    pub prefix: String,
    pub control_key: String,
    pub default_capacity: u16,
    pub max_record_size: usize,
}

impl RingOptions {
    pub fn new(namespace: &str, prefix: &str, control_key: &str, default_capacity: u16) -> Self {
        Self {
            namespace: namespace.to_string(),
            prefix: prefix.to_string(),
            control_key: control_key.to_string(),
            default_capacity,
            max_record_size: MAX_RECORD_SIZE,
        }
    }

    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }
}

/// Result of a successful `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Record stored in a free slot.
    Appended { slot: u16 },
    /// Ring was full; the oldest record was dropped to make room.
    Evicted { slot: u16 },
}

/// Identifies a run of records returned by [`RingBuffer::peek_batch`].
///
/// `start` is the ring's removal count at peek time, so a commit can tell how many of
/// the peeked records were evicted by producers in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTicket {
    epoch: u64,
    start: u64,
    len: u16,
}

impl BatchTicket {
    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A record read from a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekedRecord {
    Data(Vec<u8>),
    /// The slot could not be read back; it still counts toward the batch length.
    Unreadable { slot: u16, reason: String },
}

#[derive(Debug, Clone)]
pub struct PeekedBatch {
    pub records: Vec<PeekedRecord>,
    pub ticket: BatchTicket,
}

/// Point-in-time view of a ring, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingStatus {
    pub capacity: u16,
    pub head: u16,
    pub tail: u16,
    pub full: bool,
    pub size: u16,
    pub overwrites: u64,
}

pub struct RingBuffer {
    store: SharedStore,
    namespace: String,
    prefix: String,
    control_key: String,
    capacity_key: String,
    capacity: u16,
    control: ControlWord,
    max_record_size: usize,

    // Process-local counters, not persisted.
    epoch: u64,
    removed: u64,
    overwrites: u64,
}

impl RingBuffer {
    /// Opens the ring described by `options`, restoring persisted state.
    ///
    /// A missing or corrupt capacity or control word is replaced by defaults and
    /// written back. Only non-corruption storage failures are returned.
    pub fn open(store: SharedStore, options: RingOptions) -> QueueResult<Self> {
        if options.default_capacity == 0 {
            return Err(QueueError::InvalidCapacity(0));
        }

        let capacity_key = format!("{}{}", options.control_key, CAPACITY_KEY_SUFFIX);
        check_key_len(&options.control_key)?;
        check_key_len(&capacity_key)?;

        let ns = options.namespace.as_str();
        let capacity = match store.get_u16(ns, &capacity_key) {
            Ok(Some(stored)) if stored > 0 => {
                if stored != options.default_capacity {
                    tracing::warn!(
                        "Ring {}/{}: stored capacity {} differs from configured {}; keeping stored",
                        ns,
                        options.prefix,
                        stored,
                        options.default_capacity
                    );
                }
                stored
            }
            Ok(found) => {
                if found.is_some() {
                    tracing::warn!(
                        "Ring {}/{}: stored capacity is zero, re-initializing",
                        ns,
                        options.prefix
                    );
                }
                store.set_u16(ns, &capacity_key, options.default_capacity)?;
                options.default_capacity
            }
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Ring {}/{}: {}. Re-initializing capacity", ns, options.prefix, e);
                store.set_u16(ns, &capacity_key, options.default_capacity)?;
                options.default_capacity
            }
            Err(e) => return Err(e.into()),
        };

        // Every slot key must fit, including the widest index.
        check_key_len(&slot_key(&options.prefix, capacity - 1))?;

        let restored = match store.get(ns, &options.control_key) {
            Ok(Some(bytes)) => match ControlWord::from_bytes(&bytes).and_then(|word| {
                word.validate(capacity)?;
                Ok(word)
            }) {
                Ok(word) => Some(word),
                Err(e) => {
                    tracing::warn!(
                        "Ring {}/{}: control word rejected ({}). Resetting",
                        ns,
                        options.prefix,
                        e
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Ring {}/{}: {}. Resetting", ns, options.prefix, e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let mut ring = Self {
            store,
            namespace: options.namespace,
            prefix: options.prefix,
            control_key: options.control_key,
            capacity_key,
            capacity,
            control: ControlWord::default(),
            max_record_size: options.max_record_size,
            epoch: 0,
            removed: 0,
            overwrites: 0,
        };

        match restored {
            Some(word) => ring.control = word,
            None => ring.persist_control(ControlWord::default())?,
        }

        tracing::debug!(
            "Ring {}/{} opened: capacity={} head={} tail={} full={}",
            ring.namespace,
            ring.prefix,
            ring.capacity,
            ring.control.head,
            ring.control.tail,
            ring.control.full
        );

        Ok(ring)
    }

    /// Appends a record, evicting the oldest one if the ring is full.
    pub fn put(&mut self, record: &[u8]) -> QueueResult<PutOutcome> {
        if record.len() > self.max_record_size {
            return Err(QueueError::RecordTooLarge {
                len: record.len(),
                max: self.max_record_size,
            });
        }

        // On a full ring the head slot is the oldest live record. Drop it from the
        // persisted window before its slot is overwritten.
        let evicting = self.control.full;
        if evicting {
            let mut evicted = self.control;
            evicted.tail = self.advance(evicted.tail, 1);
            evicted.full = false;
            self.persist_control(evicted)?;
            self.removed += 1;
            self.overwrites += 1;
        }

        let slot = self.control.head;
        self.store.set(&self.namespace, &self.slot_key(slot), record)?;

        let mut next = self.control;
        next.head = self.advance(next.head, 1);
        next.full = next.head == next.tail;
        self.persist_control(next)?;

        if evicting {
            tracing::debug!(
                "Ring {}/{}: full, overwrote oldest record in slot {}",
                self.namespace,
                self.prefix,
                slot
            );
            Ok(PutOutcome::Evicted { slot })
        } else {
            Ok(PutOutcome::Appended { slot })
        }
    }

    /// Returns the oldest record without removing it.
    pub fn peek(&self) -> QueueResult<Vec<u8>> {
        self.peek_at(0)
    }

    /// Copies the oldest record into `out` and returns its length.
    pub fn peek_into(&self, out: &mut [u8]) -> QueueResult<usize> {
        let record = self.peek()?;
        if record.len() > out.len() {
            return Err(QueueError::BufferTooSmall {
                needed: record.len(),
                available: out.len(),
            });
        }
        out[..record.len()].copy_from_slice(&record);
        Ok(record.len())
    }

    /// Returns the record `offset` positions behind the tail.
    pub fn peek_at(&self, offset: u16) -> QueueResult<Vec<u8>> {
        if offset >= self.size() {
            return Err(QueueError::Empty);
        }
        let slot = self.advance(self.control.tail, offset);
        Ok(self.read_slot(slot)?)
    }

    /// Reads up to `max` records from the tail without moving it.
    ///
    /// Slots that fail to decode are reported as [`PeekedRecord::Unreadable`] so the
    /// caller can drop them; any other storage failure aborts the whole read.
    pub fn peek_batch(&self, max: u16) -> QueueResult<PeekedBatch> {
        let len = max.min(self.size());
        let mut records = Vec::with_capacity(len as usize);
        for offset in 0..len {
            let slot = self.advance(self.control.tail, offset);
            match self.read_slot(slot) {
                Ok(data) => records.push(PeekedRecord::Data(data)),
                Err(e) if e.is_corrupt() => {
                    tracing::warn!(
                        "Ring {}/{}: slot {} unreadable: {}",
                        self.namespace,
                        self.prefix,
                        slot,
                        e
                    );
                    records.push(PeekedRecord::Unreadable { slot, reason: e.to_string() });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(PeekedBatch {
            records,
            ticket: BatchTicket {
                epoch: self.epoch,
                start: self.removed,
                len,
            },
        })
    }

    /// Removes the oldest record. Call only after a successful peek was handed off.
    pub fn commit(&mut self) -> QueueResult<()> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }
        self.remove_front(1)?;
        Ok(())
    }

    /// Removes up to `count` records with a single control write.
    pub fn commit_n(&mut self, count: u16) -> QueueResult<u16> {
        let count = count.min(self.size());
        if count > 0 {
            self.remove_front(count)?;
        }
        Ok(count)
    }

    /// Removes the records of a peeked batch that are still queued.
    ///
    /// Records already evicted since the peek are not removed twice, and a ticket
    /// issued before a `reset` removes nothing.
    pub fn commit_batch(&mut self, ticket: &BatchTicket) -> QueueResult<u16> {
        if ticket.epoch != self.epoch {
            tracing::warn!(
                "Ring {}/{}: dropping commit for batch from epoch {} (current {})",
                self.namespace, self.prefix, ticket.epoch, self.epoch
            );
            return Ok(0);
        }

        let gone = self.removed.saturating_sub(ticket.start);
        let remaining = (ticket.len as u64).saturating_sub(gone);
        let count = (remaining.min(self.size() as u64)) as u16;
        if gone > 0 {
            tracing::warn!(
                "Ring {}/{}: {} record(s) of the in-flight batch were overwritten before commit",
                self.namespace, self.prefix, gone.min(ticket.len as u64)
            );
        }
        self.commit_n(count)
    }

    /// Leaves the ring unchanged after a failed hand-off; the peeked records stay queued.
    pub fn abort(&self) {
        tracing::trace!(
            "Ring {}/{}: abort, tail stays at {}",
            self.namespace,
            self.prefix,
            self.control.tail
        );
    }

    /// Destructive read: `peek` followed by `commit`.
    pub fn get(&mut self) -> QueueResult<Vec<u8>> {
        let record = self.peek()?;
        self.commit()?;
        Ok(record)
    }

    /// Logically empties the ring. Slot data is left in place and overwritten later.
    pub fn reset(&mut self) -> QueueResult<()> {
        self.persist_control(ControlWord::default())?;
        self.epoch += 1;
        tracing::info!("Ring {}/{} reset (epoch {})", self.namespace, self.prefix, self.epoch);
        Ok(())
    }

    pub fn size(&self) -> u16 {
        self.control.size(self.capacity)
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    pub fn is_full(&self) -> bool {
        self.control.full
    }

    pub fn is_empty(&self) -> bool {
        self.control.is_empty()
    }

    pub fn control(&self) -> ControlWord {
        self.control
    }

    /// Records dropped by overwrite-on-full since open.
    pub fn overwrites(&self) -> u64 {
        self.overwrites
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn capacity_key(&self) -> &str {
        &self.capacity_key
    }

    pub fn status(&self) -> RingStatus {
        RingStatus {
            capacity: self.capacity,
            head: self.control.head,
            tail: self.control.tail,
            full: self.control.full,
            size: self.size(),
            overwrites: self.overwrites,
        }
    }

    pub fn slot_key(&self, slot: u16) -> String {
        slot_key(&self.prefix, slot)
    }

    fn read_slot(&self, slot: u16) -> Result<Vec<u8>, StorageError> {
        let key = self.slot_key(slot);
        self.store.get(&self.namespace, &key)?.ok_or_else(|| {
            StorageError::corrupt(&self.namespace, &key, "slot named by control word is missing")
        })
    }

    fn remove_front(&mut self, count: u16) -> QueueResult<()> {
        let mut next = self.control;
        next.tail = self.advance(next.tail, count);
        next.full = false;
        self.persist_control(next)?;
        self.removed += count as u64;
        Ok(())
    }

    fn persist_control(&mut self, next: ControlWord) -> QueueResult<()> {
        self.store.set(&self.namespace, &self.control_key, &next.to_bytes())?;
        self.control = next;
        Ok(())
    }

    fn advance(&self, position: u16, by: u16) -> u16 {
        ((position as u32 + by as u32) % self.capacity as u32) as u16
    }
}

fn slot_key(prefix: &str, slot: u16) -> String {
    format!("{}{}", prefix, slot)
}

fn check_key_len(key: &str) -> QueueResult<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(QueueError::KeyTooLong {
            key: key.to_string(),
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}
