// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Key/value storage seam.
//!
//! All durable queue state goes through [`KvStore`]. Backends are synchronous and
//! internally serialized; the flash implementation lives in `telemq-kv`, and
//! [`MemoryStore`] backs tests and host-side simulation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StorageError;

/// Namespaced get/set/erase of opaque values.
pub trait KvStore: Send + Sync {
    /// Returns `Ok(None)` when the key has never been written or was erased.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the value atomically: readers observe either the old or the new bytes.
    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

pub type SharedStore = Arc<dyn KvStore>;

/// Fixed-width scalar accessors layered over the raw blob interface.
pub trait KvStoreExt: KvStore {
    fn get_u16(&self, namespace: &str, key: &str) -> Result<Option<u16>, StorageError> {
        match self.get(namespace, key)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 2] = bytes.as_slice().try_into().map_err(|_| {
                    let reason = format!("expected 2 bytes, found {}", bytes.len());
                    StorageError::corrupt(namespace, key, reason)
                })?;
                Ok(Some(u16::from_le_bytes(raw)))
            }
        }
    }

    fn set_u16(&self, namespace: &str, key: &str, value: u16) -> Result<(), StorageError> {
        self.set(namespace, key, &value.to_le_bytes())
    }

    fn get_i64(&self, namespace: &str, key: &str) -> Result<Option<i64>, StorageError> {
        match self.get(namespace, key)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    let reason = format!("expected 8 bytes, found {}", bytes.len());
                    StorageError::corrupt(namespace, key, reason)
                })?;
                Ok(Some(i64::from_le_bytes(raw)))
            }
        }
    }

    fn set_i64(&self, namespace: &str, key: &str, value: i64) -> Result<(), StorageError> {
        self.set(namespace, key, &value.to_le_bytes())
    }
}

impl<T: KvStore + ?Sized> KvStoreExt for T {}

/// In-memory store. Counts writes so callers can check flash wear per operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of `set` calls that reached the store.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert((namespace.to_string(), key.to_string()), value.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
