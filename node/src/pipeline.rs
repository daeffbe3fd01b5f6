// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Publish pipeline.
//!
//! A polled state machine that drains the ring to the broker:
//!
//! ```text
//! Read --send--> AwaitAck --ack ok--> AwaitWatermarkAck --sync done--> Read
//!                    |
//!                    +--ack failed / timeout--> Read (after backoff)
//! ```
//!
//! `tick` never blocks: completions arrive on a channel and are drained at the start
//! of the next tick. Lock order is ring, then tracker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use telemq_core::{BatchTicket, SharedRing};

use crate::batch::BatchPlan;
use crate::completion::{
    CompletionEvent, Completions, Outcome, PublishCompletion, Token, WatermarkCompletion,
};
use crate::errors::TransportError;
use crate::transport::Transport;
use crate::watermark::{DeliveryTracker, WatermarkPush};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub topic: String,
    pub batch_cap: u16,
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
    pub ack_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Read,
    AwaitAck,
    AwaitWatermarkAck,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Read,
    AwaitAck {
        token: Token,
        ticket: BatchTicket,
        high_water: Option<i64>,
        sent_at: Instant,
    },
    AwaitWatermarkAck {
        token: Token,
        watermark: i64,
        sent_at: Instant,
    },
}

/// Exponential retry delay, doubling from `base` up to `max`.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self { base, max: max.max(base), current: None }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.base,
            Some(prev) => prev.saturating_mul(2).min(self.max),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

pub struct Pipeline {
    ring: SharedRing,
    tracker: DeliveryTracker,
    transport: Arc<dyn Transport>,
    options: PipelineOptions,
    completions: Completions,
    state: State,
    backoff: Backoff,
    retry_at: Option<Instant>,
}

impl Pipeline {
    pub fn new(
        ring: SharedRing,
        tracker: DeliveryTracker,
        transport: Arc<dyn Transport>,
        options: PipelineOptions,
    ) -> Self {
        let backoff = Backoff::new(options.retry_backoff, options.max_retry_backoff);
        Self {
            ring,
            tracker,
            transport,
            options,
            completions: Completions::new(),
            state: State::Read,
            backoff,
            retry_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Read => Phase::Read,
            State::AwaitAck { .. } => Phase::AwaitAck,
            State::AwaitWatermarkAck { .. } => Phase::AwaitWatermarkAck,
        }
    }

    pub fn topic(&self) -> &str {
        &self.options.topic
    }

    pub fn set_topic(&mut self, topic: String) {
        self.options.topic = topic;
    }

    /// Earliest time the next send may be attempted after a failure.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Advances the state machine once.
    pub fn tick(&mut self, now: Instant) -> Phase {
        while let Some(event) = self.completions.try_next() {
            self.on_completion(event, now);
        }
        self.check_timeout(now);

        if let State::Read = self.state {
            self.try_send(now);
        }
        self.phase()
    }

    /// Forces the pipeline back to `Read` with nothing in flight.
    ///
    /// Completions for abandoned operations still arrive, but their tokens no longer
    /// match and they are discarded.
    pub fn quiesce(&mut self) {
        if !matches!(self.state, State::Read) {
            tracing::info!("Pipeline quiesced from {:?}", self.phase());
        }
        self.state = State::Read;
        self.retry_at = None;
        self.backoff.reset();
    }

    fn try_send(&mut self, now: Instant) {
        if self.retry_at.map_or(false, |at| now < at) {
            return;
        }
        if !self.transport.is_connected() {
            return;
        }

        let (batch, plan) = {
            let ring = self.ring.lock();
            metrics::gauge!("telemq_queue_depth", ring.size() as f64);
            let batch = match ring.peek_batch(self.options.batch_cap) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!("Pipeline: failed to read batch: {}", e);
                    return;
                }
            };
            if batch.ticket.is_empty() {
                return;
            }
            let tracker = self.tracker.lock();
            let plan = BatchPlan::build(&batch.records, |seq| tracker.is_delivered(seq));
            (batch, plan)
        };

        if plan.unreadable > 0 {
            tracing::warn!("Pipeline: dropping {} unreadable record(s)", plan.unreadable);
        }
        let skipped = plan.already_delivered + plan.unreadable;
        if skipped > 0 {
            metrics::counter!("telemq_records_skipped_total", skipped as u64);
        }

        if plan.events.is_empty() {
            tracing::debug!(
                "Pipeline: batch of {} held nothing to send, committing",
                batch.ticket.len()
            );
            self.commit(&batch.ticket);
            return;
        }

        let payload = match plan.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Pipeline: failed to encode batch: {}", e);
                return;
            }
        };

        if let Some(high) = plan.high_water {
            if let Err(e) = self.tracker.lock().mark_read(high) {
                tracing::warn!("Pipeline: failed to persist read cursor: {}", e);
            }
        }

        let done: PublishCompletion = self.completions.issue();
        let token = done.token();
        match self.transport.send(&self.options.topic, payload, done) {
            Ok(()) => {
                tracing::debug!(
                    "Pipeline: sent {} event(s) to {} (token {}, high-water {:?})",
                    plan.events.len(), self.options.topic, token, plan.high_water
                );
                metrics::counter!("telemq_batches_sent_total", 1);
                self.state = State::AwaitAck {
                    token,
                    ticket: batch.ticket,
                    high_water: plan.high_water,
                    sent_at: now,
                };
            }
            Err(e) => self.on_send_failed(e, now),
        }
    }

    fn on_completion(&mut self, event: CompletionEvent, now: Instant) {
        match (self.state, event.outcome) {
            (State::AwaitAck { token, ticket, high_water, sent_at }, Outcome::Published(result))
                if token == event.token =>
            {
                let roundtrip = now.saturating_duration_since(sent_at);
                metrics::histogram!("telemq_batch_roundtrip_seconds", roundtrip.as_secs_f64());
                match result {
                    Ok(()) => {
                        self.backoff.reset();
                        self.retry_at = None;
                        self.commit(&ticket);
                        match high_water {
                            Some(watermark) => self.start_watermark(watermark, now),
                            None => self.state = State::Read,
                        }
                    }
                    Err(e) => self.on_send_failed(e, now),
                }
            }
            (State::AwaitWatermarkAck { token, watermark, .. }, Outcome::WatermarkSynced(result))
                if token == event.token =>
            {
                match result {
                    Ok(()) => tracing::debug!("Pipeline: remote watermark at {}", watermark),
                    Err(e) => {
                        metrics::counter!("telemq_watermark_sync_failures_total", 1);
                        tracing::warn!("Pipeline: watermark {} not mirrored: {}", watermark, e);
                    }
                }
                self.state = State::Read;
            }
            (_, outcome) => {
                metrics::counter!("telemq_stale_acks_total", 1);
                tracing::debug!(
                    "Pipeline: ignoring stale completion {} ({:?})",
                    event.token,
                    outcome
                );
            }
        }
    }

    fn check_timeout(&mut self, now: Instant) {
        let timeout = self.options.ack_timeout;
        match self.state {
            State::AwaitAck { token, sent_at, .. }
                if now.saturating_duration_since(sent_at) >= timeout =>
            {
                tracing::warn!("Pipeline: no ack for batch {} within {:?}", token, timeout);
                self.on_send_failed(TransportError::Timeout, now);
            }
            State::AwaitWatermarkAck { watermark, sent_at, .. }
                if now.saturating_duration_since(sent_at) >= timeout =>
            {
                metrics::counter!("telemq_watermark_sync_failures_total", 1);
                tracing::warn!("Pipeline: watermark {} sync timed out", watermark);
                self.state = State::Read;
            }
            _ => {}
        }
    }

    fn on_send_failed(&mut self, error: TransportError, now: Instant) {
        self.ring.lock().abort();
        let delay = self.backoff.next_delay();
        self.retry_at = Some(now + delay);
        self.state = State::Read;
        metrics::counter!("telemq_batch_failures_total", 1);
        tracing::warn!("Pipeline: batch not delivered ({}); retrying in {:?}", error, delay);
    }

    fn commit(&mut self, ticket: &BatchTicket) {
        let mut ring = self.ring.lock();
        match ring.commit_batch(ticket) {
            Ok(count) => {
                metrics::counter!("telemq_records_committed_total", count as u64);
                metrics::gauge!("telemq_queue_depth", ring.size() as f64);
            }
            // Records stay queued; the watermark still advances, so they are
            // recognised as delivered on the next read.
            Err(e) => tracing::error!("Pipeline: commit failed: {}", e),
        }
    }

    fn start_watermark(&mut self, watermark: i64, now: Instant) {
        let done: WatermarkCompletion = self.completions.issue();
        let token = done.token();
        match self.tracker.advance_delivered(watermark, done) {
            Ok(WatermarkPush { sync: Ok(()), .. }) => {
                self.state = State::AwaitWatermarkAck { token, watermark, sent_at: now };
            }
            Ok(WatermarkPush { durable, sync: Err(e), .. }) => {
                metrics::counter!("telemq_watermark_sync_failures_total", 1);
                tracing::warn!(
                    "Pipeline: watermark {} stored locally, remote update refused: {}",
                    durable,
                    e
                );
                self.state = State::Read;
            }
            Err(e) => {
                tracing::error!("Pipeline: watermark {} not persisted locally: {}", watermark, e);
                self.state = State::Read;
            }
        }
    }
}
