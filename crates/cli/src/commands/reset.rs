// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use anyhow::bail;
use telemq_core::config::DEFAULT_CAPACITY;
use telemq_core::{RingBuffer, RingOptions, SequenceTracker, SharedStore};

use super::queue::QueueArgs;

/// Empties the queue. With `restart_from`, numbering continues after that index
/// and the watermark is set to it, as after a topic change.
pub fn run(args: &QueueArgs, restart_from: Option<i64>, confirmed: bool) -> anyhow::Result<()> {
    if !confirmed {
        bail!("Reset discards every queued record; pass --yes to proceed");
    }

    let store: SharedStore = Arc::new(args.open_store()?);
    let mut ring = RingBuffer::open(
        store.clone(),
        RingOptions::new(&args.namespace, &args.prefix, &args.control_key, DEFAULT_CAPACITY),
    )?;
    let dropped = ring.size();

    match restart_from {
        Some(index) => {
            let mut tracker = SequenceTracker::open(store, &args.namespace, &args.sequence_key)?;
            tracker.on_topic_changed(index, &mut ring)?;
            println!(
                "Dropped {} record(s); numbering restarts at {}",
                dropped,
                index.saturating_add(1)
            );
        }
        None => {
            ring.reset()?;
            println!("Dropped {} record(s)", dropped);
        }
    }
    Ok(())
}
