// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Remote watermark mirroring.
//!
//! The local [`SequenceTracker`] is the source of truth. The remote document field is
//! eventually consistent with it: updates are pushed after each delivered batch and a
//! higher remote value is adopted once at startup.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Client;
use serde_json::{json, Value};
use telemq_core::{RingBuffer, SequenceState, SequenceTracker};

use crate::completion::WatermarkCompletion;
use crate::errors::{NodeError, SyncError};

pub trait WatermarkSync: Send + Sync {
    /// Starts writing `name = value` on the remote document. Same completion contract
    /// as [`crate::transport::Transport::send`].
    fn update_field(
        &self,
        name: &str,
        value: i64,
        done: WatermarkCompletion,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Default)]
pub struct OfflineSync;

impl WatermarkSync for OfflineSync {
    fn update_field(
        &self,
        _name: &str,
        _value: i64,
        _done: WatermarkCompletion,
    ) -> Result<(), SyncError> {
        Err(SyncError::Unavailable)
    }
}

/// Shadow document over HTTP: `PATCH {url}` with `{name: value}`, `GET {url}` to read.
#[derive(Debug, Clone)]
pub struct HttpShadowSync {
    url: String,
    client: Client,
}

impl HttpShadowSync {
    pub fn new(url: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Reads `name` from the remote document. `Ok(None)` when the field is absent.
    pub async fn fetch(&self, name: &str) -> Result<Option<i64>, SyncError> {
        let resp = self.client.get(&self.url).send().await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(SyncError::Rejected(format!("Shadow request failed: {}", resp.status())));
        }

        let doc: Value = resp.json().await.map_err(|e| SyncError::InvalidDocument(e.to_string()))?;
        field_value(&doc, name)
    }
}

impl WatermarkSync for HttpShadowSync {
    fn update_field(
        &self,
        name: &str,
        value: i64,
        done: WatermarkCompletion,
    ) -> Result<(), SyncError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let request = self.client.patch(&self.url).json(&json!({ name: value }));
        runtime.spawn(async move {
            let result = match request.send().await {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(SyncError::Rejected(resp.status().to_string())),
                Err(e) => Err(SyncError::Network(e.to_string())),
            };
            done.complete(result);
        });
        Ok(())
    }
}

fn field_value(doc: &Value, name: &str) -> Result<Option<i64>, SyncError> {
    match doc.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| {
                SyncError::InvalidDocument(format!("field {} is not an integer: {}", name, v))
            }),
    }
}

/// Outcome of one [`DeliveryTracker::advance_delivered`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkPush {
    /// Whether the local watermark moved.
    pub advanced: bool,
    /// Local watermark after the call, which is also the value pushed.
    pub durable: i64,
    pub sync: Result<(), SyncError>,
}

/// Sequence tracker shared by producers, the pipeline and the control API.
#[derive(Clone)]
pub struct DeliveryTracker {
    inner: Arc<Mutex<SequenceTracker>>,
    sync: Arc<dyn WatermarkSync>,
    field: String,
}

impl DeliveryTracker {
    pub fn new(tracker: SequenceTracker, sync: Arc<dyn WatermarkSync>, field: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
            sync,
            field: field.to_string(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SequenceTracker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SequenceState {
        self.lock().state()
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Persists the new local watermark, then pushes it to the remote document.
    ///
    /// The push is attempted even when the local value was already current so the
    /// remote copy catches up after an earlier sync failure. Only a local persist
    /// failure is an `Err`; a refused push is reported in [`WatermarkPush::sync`].
    pub fn advance_delivered(
        &self,
        index: i64,
        done: WatermarkCompletion,
    ) -> Result<WatermarkPush, NodeError> {
        let (advanced, durable) = {
            let mut tracker = self.lock();
            let advanced = tracker.advance_delivered(index)?;
            (advanced, tracker.last_durable_index())
        };
        metrics::gauge!("telemq_watermark", durable as f64);
        let sync = self.sync.update_field(&self.field, durable, done);
        Ok(WatermarkPush { advanced, durable, sync })
    }

    pub fn reconcile_remote(&self, remote: i64) -> Result<bool, NodeError> {
        Ok(self.lock().reconcile_remote(remote)?)
    }

    /// Caller must already hold the ring lock (ring before tracker).
    pub fn on_topic_changed(
        &self,
        remote_last_recorded: i64,
        ring: &mut RingBuffer,
    ) -> Result<(), NodeError> {
        self.lock().on_topic_changed(remote_last_recorded, ring)?;
        metrics::gauge!("telemq_watermark", remote_last_recorded as f64);
        Ok(())
    }
}
