// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequence and watermark cursors.
//!
//! The three counters are persisted together as one blob so a crash never leaves them
//! out of step with each other:
//! ```text
//! [version: u8][bincode(SequenceState)][crc64 LE of everything before it: u64]
//! ```

use crc64fast::Digest;
use serde::{Deserialize, Serialize};

use crate::config::MAX_KEY_LEN;
use crate::error::{QueueError, StorageError, TrackerError, TrackerResult};
use crate::kv::SharedStore;
use crate::ring::RingBuffer;

const STATE_VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceState {
    /// Highest index confirmed delivered (local watermark).
    pub last_durable_index: i64,
    /// Next index the consumer expects to read.
    pub next_cursor: i64,
    /// Last index handed to a producer.
    pub last_recorded_index: i64,
}

impl SequenceState {
    pub(crate) fn encode(&self) -> TrackerResult<Vec<u8>> {
        let body = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TrackerError::Storage(StorageError::Backend(e.to_string())))?;
        let mut buf = Vec::with_capacity(1 + body.len() + CHECKSUM_LEN);
        buf.push(STATE_VERSION);
        buf.extend_from_slice(&body);
        let checksum = checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a persisted blob; any mismatch is reported as corruption of `namespace/key`.
    pub fn decode(namespace: &str, key: &str, bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < 1 + CHECKSUM_LEN {
            let reason = format!("blob too short ({} bytes)", bytes.len());
            return Err(StorageError::corrupt(namespace, key, reason));
        }
        let (data, tail) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let mut stored = [0u8; CHECKSUM_LEN];
        stored.copy_from_slice(tail);
        if u64::from_le_bytes(stored) != checksum(data) {
            return Err(StorageError::corrupt(namespace, key, "checksum mismatch"));
        }
        if data[0] != STATE_VERSION {
            let reason = format!("unsupported version {}", data[0]);
            return Err(StorageError::corrupt(namespace, key, reason));
        }
        let config = bincode::config::standard();
        let (state, _) = bincode::serde::decode_from_slice::<SequenceState, _>(&data[1..], config)
            .map_err(|e| StorageError::corrupt(namespace, key, e.to_string()))?;
        Ok(state)
    }
}

pub struct SequenceTracker {
    store: SharedStore,
    namespace: String,
    key: String,
    state: SequenceState,
}

impl SequenceTracker {
    /// Restores the persisted state, or persists defaults when it is missing or corrupt.
    pub fn open(store: SharedStore, namespace: &str, key: &str) -> TrackerResult<Self> {
        if key.len() > MAX_KEY_LEN {
            return Err(QueueError::KeyTooLong {
                key: key.to_string(),
                max: MAX_KEY_LEN,
            }
            .into());
        }

        let restored = match store.get(namespace, key) {
            Ok(Some(bytes)) => match SequenceState::decode(namespace, key, &bytes) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!("Sequence state {}/{}: {}. Using defaults", namespace, key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Sequence state {}/{}: {}. Using defaults", namespace, key, e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let mut tracker = Self {
            store,
            namespace: namespace.to_string(),
            key: key.to_string(),
            state: SequenceState::default(),
        };

        match restored {
            Some(state) => tracker.state = state,
            None => tracker.persist(SequenceState::default())?,
        }

        tracing::debug!(
            "Sequence tracker {}/{} opened: {:?}",
            tracker.namespace,
            tracker.key,
            tracker.state
        );
        Ok(tracker)
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn last_durable_index(&self) -> i64 {
        self.state.last_durable_index
    }

    /// Allocates the next producer index and persists it before returning.
    pub fn next_index(&mut self) -> TrackerResult<i64> {
        let index = self.state.last_recorded_index.checked_add(1).ok_or(TrackerError::Overflow)?;
        let mut next = self.state;
        next.last_recorded_index = index;
        self.persist(next)?;
        Ok(index)
    }

    /// Moves the read cursor past `index`. Never moves it backwards.
    pub fn mark_read(&mut self, index: i64) -> TrackerResult<()> {
        let cursor = index.checked_add(1).ok_or(TrackerError::Overflow)?;
        if cursor <= self.state.next_cursor {
            return Ok(());
        }
        let mut next = self.state;
        next.next_cursor = cursor;
        self.persist(next)
    }

    /// Raises the local watermark to `index`. Returns `false` if it was already at or above it.
    pub fn advance_delivered(&mut self, index: i64) -> TrackerResult<bool> {
        if index <= self.state.last_durable_index {
            return Ok(false);
        }
        let mut next = self.state;
        next.last_durable_index = index;
        let cursor = index.checked_add(1).ok_or(TrackerError::Overflow)?;
        next.next_cursor = next.next_cursor.max(cursor);
        self.persist(next)?;
        Ok(true)
    }

    /// Adopts a remote watermark ahead of the local one.
    ///
    /// The producer counter is raised as well so newly recorded events are not mistaken
    /// for already delivered ones.
    pub fn reconcile_remote(&mut self, remote: i64) -> TrackerResult<bool> {
        if remote <= self.state.last_durable_index {
            return Ok(false);
        }
        let mut next = self.state;
        next.last_durable_index = remote;
        let cursor = remote.checked_add(1).ok_or(TrackerError::Overflow)?;
        next.next_cursor = next.next_cursor.max(cursor);
        next.last_recorded_index = next.last_recorded_index.max(remote);
        self.persist(next)?;
        tracing::info!("Adopted remote watermark {} for {}/{}", remote, self.namespace, self.key);
        Ok(true)
    }

    pub fn is_delivered(&self, index: i64) -> bool {
        index <= self.state.last_durable_index
    }

    /// Restarts numbering from `remote_last_recorded` and empties `ring`.
    ///
    /// The ring is reset first: a crash in between leaves an empty queue with the old
    /// cursors, which only costs index gaps.
    pub fn on_topic_changed(
        &mut self,
        remote_last_recorded: i64,
        ring: &mut RingBuffer,
    ) -> TrackerResult<()> {
        let cursor = remote_last_recorded.checked_add(1).ok_or(TrackerError::Overflow)?;
        ring.reset()?;
        self.persist(SequenceState {
            last_durable_index: remote_last_recorded,
            next_cursor: cursor,
            last_recorded_index: remote_last_recorded,
        })?;
        tracing::info!(
            "Topic changed: cursors for {}/{} restart at {}",
            self.namespace, self.key, remote_last_recorded
        );
        Ok(())
    }

    fn persist(&mut self, next: SequenceState) -> TrackerResult<()> {
        let blob = next.encode()?;
        self.store.set(&self.namespace, &self.key, &blob)?;
        self.state = next;
        Ok(())
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(bytes);
    digest.sum64()
}
