// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::extract::{Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::agent::{QueueStatus, SharedAgent};
use crate::api::*;
use crate::errors::NodeError;

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(provided) if provided == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router(agent: SharedAgent, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/v1/events", post(record_event))
        .route("/v1/queue", get(queue_status))
        .route("/v1/topic", post(change_topic))
        // Observability
        .route("/metrics", get(metrics_handler))
        .with_state(agent);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        app = app.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    app
}

async fn record_event(
    State(agent): State<SharedAgent>,
    Json(req): Json<RecordEventRequest>,
) -> Result<Json<RecordEventResponse>, NodeError> {
    let payload =
        serde_json::to_vec(&req.data).map_err(|e| NodeError::InvalidInput(e.to_string()))?;
    let recorded = agent.record_event(&payload)?;
    Ok(Json(RecordEventResponse {
        index: recorded.index,
        evicted: recorded.evicted,
    }))
}

async fn queue_status(State(agent): State<SharedAgent>) -> Json<QueueStatus> {
    Json(agent.status().await)
}

async fn change_topic(
    State(agent): State<SharedAgent>,
    Json(req): Json<TopicChangeRequest>,
) -> Result<Json<TopicChangeResponse>, NodeError> {
    if req.topic.trim().is_empty() {
        return Err(NodeError::InvalidInput("topic must not be empty".to_string()));
    }
    agent.change_topic(req.topic.clone(), req.last_recorded_index).await?;
    Ok(Json(TopicChangeResponse {
        topic: req.topic,
        next_index: req.last_recorded_index.saturating_add(1),
    }))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
