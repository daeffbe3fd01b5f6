// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::Client;

use crate::completion::PublishCompletion;
use crate::errors::TransportError;

/// Broker connection used by the pipeline.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Starts publishing `payload` to `topic` and returns without waiting.
    ///
    /// An accepted send reports its result through `done` exactly once. On `Err` the
    /// send was never started and `done` is dropped.
    fn send(
        &self,
        topic: &str,
        payload: Vec<u8>,
        done: PublishCompletion,
    ) -> Result<(), TransportError>;
}

/// Transport used when no broker is configured. Events accumulate in the ring.
#[derive(Debug, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn is_connected(&self) -> bool {
        false
    }

    fn send(
        &self,
        _topic: &str,
        _payload: Vec<u8>,
        _done: PublishCompletion,
    ) -> Result<(), TransportError> {
        Err(TransportError::Disconnected)
    }
}

/// Publishes batches with `POST {base_url}/topics/{topic}`.
///
/// After a network failure the transport reports itself disconnected until
/// `reconnect_after` has elapsed, then lets the next batch probe the broker.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    reconnect_after: Duration,
    last_failure: Arc<Mutex<Option<Instant>>>,
}

impl HttpTransport {
    pub fn new(url: String, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
            reconnect_after: Duration::from_secs(5),
            last_failure: Default::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn is_connected(&self) -> bool {
        match *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(at) => at.elapsed() >= self.reconnect_after,
            None => true,
        }
    }

    fn send(
        &self,
        topic: &str,
        payload: Vec<u8>,
        done: PublishCompletion,
    ) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let url = format!("{}/topics/{}", self.base_url, topic);
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        let last_failure = self.last_failure.clone();

        runtime.spawn(async move {
            let result = match request.send().await {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(TransportError::Rejected(resp.status().to_string())),
                Err(e) => Err(TransportError::Network(e.to_string())),
            };

            let mut failure = last_failure.lock().unwrap_or_else(PoisonError::into_inner);
            *failure = match &result {
                Err(TransportError::Network(e)) => {
                    tracing::warn!("Broker unreachable at {}: {}", url, e);
                    Some(Instant::now())
                }
                _ => None,
            };
            drop(failure);

            done.complete(result);
        });

        Ok(())
    }
}
