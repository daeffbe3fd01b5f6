// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Producer ingest. `data` is stored as its JSON encoding.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordEventRequest {
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordEventResponse {
    pub index: i64,
    pub evicted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicChangeRequest {
    pub topic: String,
    /// Last index the backend recorded for the new topic; numbering resumes after it.
    #[serde(default)]
    pub last_recorded_index: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicChangeResponse {
    pub topic: String,
    pub next_index: i64,
}
