// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Wires the ring, tracker and pipeline together and owns the polling task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use telemq_core::record::{EventRecord, HEADER_LEN};
use telemq_core::{
    PutOutcome, QueueError, RingBuffer, RingStatus, SequenceState, SequenceTracker, SharedRing,
    SharedStore,
};
use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::errors::NodeError;
use crate::pipeline::{Phase, Pipeline};
use crate::transport::Transport;
use crate::watermark::{DeliveryTracker, WatermarkSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub index: i64,
    pub evicted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub topic: String,
    pub phase: Phase,
    pub ring: RingStatus,
    pub sequence: SequenceState,
}

pub struct Agent {
    ring: SharedRing,
    tracker: DeliveryTracker,
    pipeline: Mutex<Pipeline>,
    poll_interval: Duration,
}

pub type SharedAgent = Arc<Agent>;

impl Agent {
    pub fn open(
        config: &NodeConfig,
        store: SharedStore,
        transport: Arc<dyn Transport>,
        sync: Arc<dyn WatermarkSync>,
    ) -> Result<Self, NodeError> {
        let ring = SharedRing::new(RingBuffer::open(store.clone(), config.ring_options())?);
        let tracker = SequenceTracker::open(store, &config.namespace, &config.sequence_key)?;
        let tracker = DeliveryTracker::new(tracker, sync, &config.watermark_field);

        let status = ring.status();
        let state = tracker.state();
        tracing::info!(
            "Queue restored: {} record(s) of {} queued, last recorded {}, watermark {}",
            status.size, status.capacity, state.last_recorded_index, state.last_durable_index
        );
        metrics::gauge!("telemq_queue_depth", status.size as f64);
        metrics::gauge!("telemq_watermark", state.last_durable_index as f64);

        let pipeline =
            Pipeline::new(ring.clone(), tracker.clone(), transport, config.pipeline_options());
        Ok(Self {
            ring,
            tracker,
            pipeline: Mutex::new(pipeline),
            poll_interval: config.poll_interval,
        })
    }

    /// Assigns the next sequence index to `payload` and appends it to the ring.
    pub fn record_event(&self, payload: &[u8]) -> Result<RecordedEvent, NodeError> {
        let mut ring = self.ring.lock();
        // Reject before an index is allocated and persisted.
        let len = HEADER_LEN + payload.len();
        if len > ring.max_record_size() {
            return Err(QueueError::RecordTooLarge { len, max: ring.max_record_size() }.into());
        }
        let index = self.tracker.lock().next_index()?;
        let outcome = ring.put(&EventRecord::new(index, payload.to_vec()).encode())?;

        metrics::counter!("telemq_events_recorded_total", 1);
        metrics::gauge!("telemq_queue_depth", ring.size() as f64);
        let evicted = matches!(outcome, PutOutcome::Evicted { .. });
        if evicted {
            metrics::counter!("telemq_ring_overwrites_total", 1);
            tracing::warn!("Queue full: event {} replaced the oldest record", index);
        }
        Ok(RecordedEvent { index, evicted })
    }

    /// Adopts a remote watermark read at startup.
    pub fn reconcile_remote(&self, remote: i64) -> Result<bool, NodeError> {
        let adopted = self.tracker.reconcile_remote(remote)?;
        if adopted {
            metrics::gauge!("telemq_watermark", remote as f64);
        }
        Ok(adopted)
    }

    /// Switches to `topic`, dropping everything queued for the old one.
    pub async fn change_topic(
        &self,
        topic: String,
        remote_last_recorded: i64,
    ) -> Result<(), NodeError> {
        let mut pipeline = self.pipeline.lock().await;
        pipeline.quiesce();
        {
            let mut ring = self.ring.lock();
            self.tracker.on_topic_changed(remote_last_recorded, &mut ring)?;
        }
        tracing::info!("Topic changed from {} to {}", pipeline.topic(), topic);
        pipeline.set_topic(topic);
        metrics::gauge!("telemq_queue_depth", 0.0);
        Ok(())
    }

    pub async fn tick(&self) -> Phase {
        self.tick_at(Instant::now()).await
    }

    pub async fn tick_at(&self, now: Instant) -> Phase {
        self.pipeline.lock().await.tick(now)
    }

    pub async fn status(&self) -> QueueStatus {
        let pipeline = self.pipeline.lock().await;
        QueueStatus {
            topic: pipeline.topic().to_string(),
            phase: pipeline.phase(),
            ring: self.ring.status(),
            sequence: self.tracker.state(),
        }
    }

    /// Polls the pipeline on a fixed interval until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("Publish pipeline polling every {:?}", self.poll_interval);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}
