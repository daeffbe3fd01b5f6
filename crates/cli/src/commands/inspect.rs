// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use super::queue::{QueueArgs, QueueView};

pub fn run(args: &QueueArgs) -> anyhow::Result<()> {
    let store = args.open_store()?;
    let view = QueueView::load(&store, args)?;

    println!("\nTelemq Queue Report");
    println!("-------------------");
    println!("Store: {}  Namespace: {}", store.dir().display(), args.namespace);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Entry", "Status", "Details"]);

    // 1. Capacity
    match &view.capacity {
        Ok(Some(cap)) => table.add_row(row("Capacity", "OK", format!("{} slots", cap))),
        Ok(None) => table.add_row(row("Capacity", "MISSING", String::new())),
        Err(e) => table.add_row(row("Capacity", "CORRUPT", e.clone())),
    };

    // 2. Control word
    match (&view.control, view.layout()) {
        (Ok(Some(word)), Some((cap, _))) => {
            let msg = format!(
                "Head: {}, Tail: {}, Full: {}, Size: {}",
                word.head,
                word.tail,
                word.full,
                word.size(cap)
            );
            table.add_row(row("Control", "OK", msg))
        }
        (Ok(Some(word)), None) => {
            let msg = format!(
                "Head: {}, Tail: {}, Full: {} (no usable capacity)",
                word.head, word.tail, word.full
            );
            table.add_row(row("Control", "UNCHECKED", msg))
        }
        (Ok(None), _) => table.add_row(row("Control", "MISSING", String::new())),
        (Err(e), _) => table.add_row(row("Control", "CORRUPT", e.clone())),
    };

    // 3. Sequence state
    match &view.sequence {
        Ok(Some(state)) => {
            let msg = format!(
                "Watermark: {}, Next Cursor: {}, Last Recorded: {}",
                state.last_durable_index, state.next_cursor, state.last_recorded_index
            );
            table.add_row(row("Sequence", "OK", msg))
        }
        Ok(None) => table.add_row(row("Sequence", "MISSING", String::new())),
        Err(e) => table.add_row(row("Sequence", "CORRUPT", e.clone())),
    };

    // 4. Raw entries
    table.add_row(row("Entries", "INFO", format!("{} keys in namespace", view.keys.len())));

    println!("{table}");
    Ok(())
}

fn row(entry: &str, status: &str, details: impl Into<String>) -> Vec<String> {
    vec![entry.to_string(), status.to_string(), details.into()]
}
