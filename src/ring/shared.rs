// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{PutOutcome, RingBuffer, RingStatus};
use crate::error::QueueResult;

/// Ring handle shared by producers and the consumer.
///
/// Each mutation runs read-modify-persist under one lock. A poisoned lock is recovered:
/// in-memory pointers only change after a successful persist, so they are never torn.
#[derive(Clone)]
pub struct SharedRing {
    inner: Arc<Mutex<RingBuffer>>,
}

impl SharedRing {
    pub fn new(ring: RingBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ring)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, record: &[u8]) -> QueueResult<PutOutcome> {
        self.lock().put(record)
    }

    pub fn size(&self) -> u16 {
        self.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn status(&self) -> RingStatus {
        self.lock().status()
    }
}
