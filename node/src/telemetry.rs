// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "telemq_node=info,telemq_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer());
    if subscriber.try_init().is_err() {
        tracing::warn!("Tracing subscriber already installed");
    }

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {}", e);
            return;
        }
    }

    metrics::describe_counter!("telemq_events_recorded_total", "Events appended to the queue");
    metrics::describe_counter!(
        "telemq_ring_overwrites_total",
        "Oldest records dropped because the queue was full"
    );
    metrics::describe_counter!(
        "telemq_batches_sent_total",
        "Batches handed to the broker transport"
    );
    metrics::describe_counter!(
        "telemq_batch_failures_total",
        "Batches that failed or timed out and will be retried"
    );
    metrics::describe_counter!(
        "telemq_records_committed_total",
        "Records removed from the queue after delivery"
    );
    metrics::describe_counter!(
        "telemq_stale_acks_total",
        "Completions ignored because their token was no longer live"
    );
    metrics::describe_counter!(
        "telemq_watermark_sync_failures_total",
        "Watermark pushes that failed or timed out"
    );
    metrics::describe_counter!(
        "telemq_records_skipped_total",
        "Already delivered or unreadable records dropped without sending"
    );
    metrics::describe_gauge!("telemq_queue_depth", "Records currently queued");
    metrics::describe_gauge!("telemq_watermark", "Local delivered watermark");
    metrics::describe_histogram!(
        "telemq_batch_roundtrip_seconds",
        "Time from batch send to broker completion"
    );

    // Ensure at least one metric exists on startup
    metrics::gauge!("telemq_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
