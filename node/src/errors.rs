// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use telemq_core::{QueueError, StorageError, TrackerError};

/// Failure of a broker send. Always retryable; the batch is redelivered unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport disconnected")]
    Disconnected,
    #[error("Broker rejected batch: {0}")]
    Rejected(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("No acknowledgement within the ack timeout")]
    Timeout,
    #[error("Send completion dropped without a result")]
    Dropped,
}

/// Failure pushing the watermark to the remote document. Logged only; local state has
/// already advanced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Watermark sync unavailable")]
    Unavailable,
    #[error("Document store rejected update: {0}")]
    Rejected(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid remote document: {0}")]
    InvalidDocument(String),
    #[error("Sync completion dropped without a result")]
    Dropped,
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NodeError::Queue(QueueError::RecordTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            NodeError::Queue(QueueError::Empty) => StatusCode::NOT_FOUND,
            NodeError::Queue(QueueError::Storage(_)) | NodeError::Storage(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            NodeError::Tracker(TrackerError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Transport(_) | NodeError::Sync(_) => StatusCode::BAD_GATEWAY,
            NodeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
