// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use telemq_core::record::EventRecord;
use telemq_core::{MemoryStore, RingBuffer, RingOptions, SequenceTracker, SharedRing, SharedStore};
use telemq_node::completion::{PublishCompletion, WatermarkCompletion};
use telemq_node::errors::{SyncError, TransportError};
use telemq_node::pipeline::{Pipeline, PipelineOptions};
use telemq_node::transport::Transport;
use telemq_node::watermark::{DeliveryTracker, WatermarkSync};

pub const NS: &str = "telemq";
pub const FIELD: &str = "last_published_index";
pub const TOPIC: &str = "dev/events";

/// Broker double: records every send and holds completions until the test acks them.
pub struct ScriptedTransport {
    connected: AtomicBool,
    reject_sends: AtomicBool,
    inflight: Mutex<VecDeque<PublishCompletion>>,
    sent: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            reject_sends: AtomicBool::new(false),
            inflight: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Completes the oldest outstanding send. Returns false if none was pending.
    pub fn ack(&self, result: Result<(), TransportError>) -> bool {
        match self.inflight.lock().unwrap().pop_front() {
            Some(done) => {
                done.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sequence numbers carried by the `n`th send.
    pub fn sent_seqs(&self, n: usize) -> Vec<i64> {
        let sent = self.sent();
        sent[n].1["events"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e.get("seq").and_then(Value::as_i64))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(
        &self,
        topic: &str,
        payload: Vec<u8>,
        done: PublishCompletion,
    ) -> Result<(), TransportError> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Network("scripted refusal".into()));
        }
        let body: Value = serde_json::from_slice(&payload).unwrap();
        self.sent.lock().unwrap().push((topic.to_string(), body));
        self.inflight.lock().unwrap().push_back(done);
        Ok(())
    }
}

/// Shadow document double.
pub struct ScriptedSync {
    inflight: Mutex<VecDeque<WatermarkCompletion>>,
    updates: Mutex<Vec<(String, i64)>>,
}

impl ScriptedSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inflight: Mutex::new(VecDeque::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn ack(&self, result: Result<(), SyncError>) -> bool {
        match self.inflight.lock().unwrap().pop_front() {
            Some(done) => {
                done.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn updates(&self) -> Vec<(String, i64)> {
        self.updates.lock().unwrap().clone()
    }
}

impl WatermarkSync for ScriptedSync {
    fn update_field(
        &self,
        name: &str,
        value: i64,
        done: WatermarkCompletion,
    ) -> Result<(), SyncError> {
        self.updates.lock().unwrap().push((name.to_string(), value));
        self.inflight.lock().unwrap().push_back(done);
        Ok(())
    }
}

pub fn options(batch_cap: u16) -> PipelineOptions {
    PipelineOptions {
        topic: TOPIC.to_string(),
        batch_cap,
        retry_backoff: Duration::from_secs(1),
        max_retry_backoff: Duration::from_secs(8),
        ack_timeout: Duration::from_secs(30),
    }
}

pub struct Harness {
    pub mem: Arc<MemoryStore>,
    pub store: SharedStore,
    pub ring: SharedRing,
    pub tracker: DeliveryTracker,
    pub transport: Arc<ScriptedTransport>,
    pub sync: Arc<ScriptedSync>,
    pub pipeline: Pipeline,
    pub t0: Instant,
}

impl Harness {
    pub fn new(capacity: u16, batch_cap: u16) -> Self {
        let mem = MemoryStore::shared();
        let store: SharedStore = mem.clone();
        let ring = SharedRing::new(
            RingBuffer::open(store.clone(), RingOptions::new(NS, "ev", "ev_ctrl", capacity))
                .unwrap(),
        );
        let transport = ScriptedTransport::new();
        let sync = ScriptedSync::new();
        let tracker = DeliveryTracker::new(
            SequenceTracker::open(store.clone(), NS, "seq_state").unwrap(),
            sync.clone(),
            FIELD,
        );
        let pipeline =
            Pipeline::new(ring.clone(), tracker.clone(), transport.clone(), options(batch_cap));
        Self {
            mem,
            store,
            ring,
            tracker,
            transport,
            sync,
            pipeline,
            t0: Instant::now(),
        }
    }

    /// Records an event the way a producer does: ring lock, index, put.
    pub fn record(&self, payload: &str) -> i64 {
        let mut ring = self.ring.lock();
        let index = self.tracker.lock().next_index().unwrap();
        ring.put(&EventRecord::new(index, payload.as_bytes().to_vec()).encode()).unwrap();
        index
    }

    pub fn at(&self, offset_ms: u64) -> Instant {
        self.t0 + Duration::from_millis(offset_ms)
    }

    pub fn watermark(&self) -> i64 {
        self.tracker.state().last_durable_index
    }
}
