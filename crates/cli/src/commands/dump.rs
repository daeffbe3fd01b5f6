// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::bail;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use telemq_core::record::EventRecord;
use telemq_core::RecordError;

use super::queue::{live_slots, QueueArgs, QueueView};

const PREVIEW_CHARS: usize = 48;

#[derive(Debug, Serialize)]
pub struct DumpRow {
    pub position: u16,
    pub slot: u16,
    /// Event index when the slot holds an enveloped record.
    pub index: Option<i64>,
    pub bytes: usize,
    pub payload: String,
}

/// Live records oldest first, up to `limit`.
pub fn collect(args: &QueueArgs, limit: Option<usize>) -> anyhow::Result<Vec<DumpRow>> {
    let store = args.open_store()?;
    let view = QueueView::load(&store, args)?;
    let Some((capacity, control)) = view.layout() else {
        bail!(
            "Queue {}/{} has no readable layout; run `telemq inspect`",
            args.namespace,
            args.prefix
        );
    };

    let mut rows = Vec::new();
    for live in live_slots(&store, args, capacity, control)?
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
    {
        let row = match live.bytes {
            Ok(bytes) => match EventRecord::decode(&bytes) {
                Ok(record) => DumpRow {
                    position: live.position,
                    slot: live.slot,
                    index: Some(record.index),
                    bytes: bytes.len(),
                    payload: String::from_utf8_lossy(&record.payload).into_owned(),
                },
                Err(RecordError::NotEnveloped) => DumpRow {
                    position: live.position,
                    slot: live.slot,
                    index: None,
                    bytes: bytes.len(),
                    payload: String::from_utf8_lossy(&bytes).into_owned(),
                },
                Err(e) => DumpRow {
                    position: live.position,
                    slot: live.slot,
                    index: None,
                    bytes: bytes.len(),
                    payload: format!("<{}>", e),
                },
            },
            Err(reason) => DumpRow {
                position: live.position,
                slot: live.slot,
                index: None,
                bytes: 0,
                payload: format!("<{}>", reason),
            },
        };
        rows.push(row);
    }
    Ok(rows)
}

pub fn run(args: &QueueArgs, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let rows = collect(args, limit)?;

    if json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Slot", "Index", "Bytes", "Payload"]);

    for row in &rows {
        let index = row.index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            row.position.to_string(),
            row.slot.to_string(),
            index,
            row.bytes.to_string(),
            preview(&row.payload),
        ]);
    }

    println!("{table}");
    println!("{} record(s)", rows.len());
    Ok(())
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
