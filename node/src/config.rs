// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemq_core::config::{
    DEFAULT_BATCH_CAP, DEFAULT_CAPACITY, DEFAULT_CONTROL_KEY, DEFAULT_NAMESPACE,
    DEFAULT_RING_PREFIX, DEFAULT_SEQUENCE_KEY, MAX_RECORD_SIZE,
};
use telemq_core::RingOptions;

use crate::errors::NodeError;
use crate::pipeline::PipelineOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub partition: String,
    pub namespace: String,
    pub ring_prefix: String,
    pub control_key: String,
    pub sequence_key: String,
    pub capacity: u16,
    pub max_record_size: usize,
    pub batch_cap: u16,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    #[serde(with = "millis")]
    pub retry_backoff: Duration,
    #[serde(with = "millis")]
    pub max_retry_backoff: Duration,
    #[serde(with = "millis")]
    pub ack_timeout: Duration,
    pub topic: String,
    pub watermark_field: String,
    pub broker_url: Option<String>,
    pub shadow_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("telemq-data"),
            partition: "nvs".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            ring_prefix: DEFAULT_RING_PREFIX.to_string(),
            control_key: DEFAULT_CONTROL_KEY.to_string(),
            sequence_key: DEFAULT_SEQUENCE_KEY.to_string(),
            capacity: DEFAULT_CAPACITY,
            max_record_size: MAX_RECORD_SIZE,
            batch_cap: DEFAULT_BATCH_CAP as u16,
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
            max_retry_backoff: Duration::from_secs(60),
            ack_timeout: Duration::from_secs(30),
            topic: "telemq/events".to_string(),
            watermark_field: "last_published_index".to_string(),
            broker_url: None,
            shadow_url: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            auth_token: None,
        }
    }
}

impl NodeConfig {
    /// Loads `TELEMQ_CONFIG` (a JSON file) if set, then applies `TELEMQ_*` overrides.
    pub fn from_env() -> Result<Self, NodeError> {
        let mut cfg = match std::env::var("TELEMQ_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)?;
                serde_json::from_str(&raw)
                    .map_err(|e| NodeError::Config(format!("{}: {}", path, e)))?
            }
            Err(_) => NodeConfig::default(),
        };
        cfg.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), NodeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TELEMQ_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TELEMQ_PARTITION") {
            self.partition = v;
        }
        if let Some(v) = lookup("TELEMQ_NAMESPACE") {
            self.namespace = v;
        }
        if let Some(v) = lookup("TELEMQ_RING_PREFIX") {
            self.ring_prefix = v;
        }
        if let Some(v) = lookup("TELEMQ_CONTROL_KEY") {
            self.control_key = v;
        }
        if let Some(v) = lookup("TELEMQ_SEQUENCE_KEY") {
            self.sequence_key = v;
        }
        if let Some(v) = lookup("TELEMQ_CAPACITY") {
            self.capacity = parse("TELEMQ_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("TELEMQ_MAX_RECORD_SIZE") {
            self.max_record_size = parse("TELEMQ_MAX_RECORD_SIZE", &v)?;
        }
        if let Some(v) = lookup("TELEMQ_BATCH_CAP") {
            self.batch_cap = parse("TELEMQ_BATCH_CAP", &v)?;
        }
        if let Some(v) = lookup("TELEMQ_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(parse("TELEMQ_POLL_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("TELEMQ_RETRY_BACKOFF_MS") {
            self.retry_backoff = Duration::from_millis(parse("TELEMQ_RETRY_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("TELEMQ_MAX_RETRY_BACKOFF_MS") {
            self.max_retry_backoff =
                Duration::from_millis(parse("TELEMQ_MAX_RETRY_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("TELEMQ_ACK_TIMEOUT_MS") {
            self.ack_timeout = Duration::from_millis(parse("TELEMQ_ACK_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("TELEMQ_TOPIC") {
            self.topic = v;
        }
        if let Some(v) = lookup("TELEMQ_WATERMARK_FIELD") {
            self.watermark_field = v;
        }
        if let Some(v) = lookup("TELEMQ_BROKER_URL") {
            self.broker_url = Some(v);
        }
        if let Some(v) = lookup("TELEMQ_SHADOW_URL") {
            self.shadow_url = Some(v);
        }
        if let Some(v) = lookup("TELEMQ_BIND_ADDR") {
            self.bind_addr = parse("TELEMQ_BIND_ADDR", &v)?;
        }
        if let Some(v) = lookup("TELEMQ_AUTH_TOKEN") {
            self.auth_token = Some(v);
        }

        if self.batch_cap == 0 {
            return Err(NodeError::Config("batch_cap must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn ring_options(&self) -> RingOptions {
        RingOptions::new(&self.namespace, &self.ring_prefix, &self.control_key, self.capacity)
            .with_max_record_size(self.max_record_size)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            topic: self.topic.clone(),
            batch_cap: self.batch_cap,
            retry_backoff: self.retry_backoff,
            max_retry_backoff: self.max_retry_backoff,
            ack_timeout: self.ack_timeout,
        }
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T, NodeError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| NodeError::Config(format!("{}={:?}: {}", name, value, e)))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
