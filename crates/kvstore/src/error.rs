// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::io;
use thiserror::Error;

use telemq_core::StorageError;

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Invalid magic bytes in header")]
    InvalidMagic,
    #[error("Unsupported entry version {0}")]
    UnsupportedVersion(u16),
    #[error("Checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        expected: u64,
        found: u64,
    },
    #[error("Length mismatch: header says {declared} bytes, file holds {found}")]
    LengthMismatch {
        declared: usize,
        found: usize,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl EntryError {
    /// Maps a file-level failure onto the storage seam. Anything but plain I/O is corruption.
    pub fn into_storage(self, namespace: &str, key: &str) -> StorageError {
        match self {
            EntryError::IoError(e) if e.kind() != io::ErrorKind::UnexpectedEof => {
                StorageError::Io(e)
            }
            other => StorageError::corrupt(namespace, key, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EntryError>;
