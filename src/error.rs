// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Failure reported by a [`crate::kv::KvStore`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt entry {namespace}/{key}: {reason}")]
    Corrupt {
        namespace: String,
        key: String,
        reason: String,
    },

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn corrupt(namespace: &str, key: &str, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            namespace: namespace.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Corruption is recoverable by re-initializing the entry; everything else is not.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    /// Peek or commit on an empty queue. Not a failure; the consumer idles.
    #[error("Queue is empty")]
    Empty,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record too large: {len} bytes exceeds slot limit of {max}")]
    RecordTooLarge { len: usize, max: usize },

    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Invalid ring capacity: {0}")]
    InvalidCapacity(u16),

    #[error("Key {key:?} exceeds {max} characters")]
    KeyTooLong { key: String, max: usize },
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Sequence index overflow")]
    Overflow,
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    /// Bytes do not start with the envelope magic; the record is opaque.
    #[error("Not an enveloped record")]
    NotEnveloped,

    #[error("Unsupported record version {0}")]
    Version(u8),

    #[error("Truncated record: header declares {declared} payload bytes, found {found}")]
    Truncated { declared: usize, found: usize },
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
