// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod record_tests;
pub mod scenario_tests;
pub mod sequence_tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;
use crate::kv::{KvStore, MemoryStore, SharedStore};
use crate::ring::{RingBuffer, RingOptions};

pub const NS: &str = "telemq";

pub fn open_ring(store: &SharedStore, capacity: u16) -> RingBuffer {
    RingBuffer::open(store.clone(), RingOptions::new(NS, "ev", "ev_ctrl", capacity)).unwrap()
}

pub fn memory() -> (Arc<MemoryStore>, SharedStore) {
    let mem = MemoryStore::shared();
    let shared: SharedStore = mem.clone();
    (mem, shared)
}

/// Store whose writes can be made to fail, optionally only for one key.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
    pub fail_key: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn fail_on(&self, key: &str) {
        *self.fail_key.lock().unwrap() = Some(key.to_string());
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_writes.store(false, Ordering::SeqCst);
    }
}

impl KvStore for FlakyStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(namespace, key)
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            let only = self.fail_key.lock().unwrap().clone();
            if only.as_deref().map_or(true, |k| k == key) {
                return Err(StorageError::Backend(format!("injected write failure on {}", key)));
            }
        }
        self.inner.set(namespace, key, value)
    }

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.inner.erase(namespace, key)
    }
}
