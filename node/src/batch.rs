// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Batch framing.
//!
//! ```json
//! {"events":[{"seq":12,"data":{...}},{"data":"opaque"}]}
//! ```
//! `data` is embedded as JSON when the payload parses as JSON, otherwise as a string.

use serde::Serialize;
use serde_json::Value;
use telemq_core::record::EventRecord;
use telemq_core::PeekedRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub seq: Option<i64>,
    pub data: Value,
}

impl OutboundEvent {
    /// Unwraps the record envelope when present.
    pub fn from_record(bytes: &[u8]) -> Self {
        match EventRecord::decode(bytes) {
            Ok(record) => Self {
                seq: Some(record.index),
                data: payload_value(&record.payload),
            },
            Err(_) => Self {
                seq: None,
                data: payload_value(bytes),
            },
        }
    }
}

/// What the pipeline does with one peeked batch.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub events: Vec<OutboundEvent>,
    /// Highest sequence index being sent, if any record carries one.
    pub high_water: Option<i64>,
    /// Records at or below the watermark; committed without sending.
    pub already_delivered: usize,
    pub unreadable: usize,
}

impl BatchPlan {
    pub fn build<F>(records: &[PeekedRecord], is_delivered: F) -> Self
    where
        F: Fn(i64) -> bool,
    {
        let mut plan = BatchPlan::default();
        for record in records {
            match record {
                PeekedRecord::Data(bytes) => {
                    let event = OutboundEvent::from_record(bytes);
                    if let Some(seq) = event.seq {
                        if is_delivered(seq) {
                            plan.already_delivered += 1;
                            continue;
                        }
                        plan.high_water = Some(plan.high_water.map_or(seq, |hw| hw.max(seq)));
                    }
                    plan.events.push(event);
                }
                PeekedRecord::Unreadable { .. } => plan.unreadable += 1,
            }
        }
        plan
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            events: Vec<WireEvent<'a>>,
        }

        #[derive(Serialize)]
        struct WireEvent<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            seq: Option<i64>,
            data: &'a Value,
        }

        let wire = Wire {
            events: self
                .events
                .iter()
                .map(|e| WireEvent { seq: e.seq, data: &e.data })
                .collect(),
        };
        serde_json::to_vec(&wire)
    }
}

fn payload_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
