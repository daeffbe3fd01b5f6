// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::bail;
use telemq_core::record::EventRecord;
use telemq_core::RecordError;

use super::queue::{live_slots, QueueArgs, QueueView};

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub enveloped: usize,
    pub opaque: usize,
    /// `(slot, reason)` for every live slot that cannot be delivered.
    pub damaged: Vec<(u16, String)>,
    /// Problems with the capacity, control word or sequence state.
    pub metadata: Vec<String>,
    /// Enveloped indices that do not increase from tail to head.
    pub out_of_order: usize,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.damaged.is_empty() && self.metadata.is_empty() && self.out_of_order == 0
    }
}

pub fn check(args: &QueueArgs) -> anyhow::Result<VerifyReport> {
    let store = args.open_store()?;
    let view = QueueView::load(&store, args)?;
    let mut report = VerifyReport::default();

    match &view.capacity {
        Ok(Some(0)) => report.metadata.push("capacity is zero".to_string()),
        Ok(Some(_)) => {}
        Ok(None) => report.metadata.push("capacity is missing".to_string()),
        Err(e) => report.metadata.push(e.clone()),
    }
    match &view.control {
        Ok(Some(_)) => {}
        Ok(None) => report.metadata.push("control word is missing".to_string()),
        Err(e) => report.metadata.push(e.clone()),
    }
    if let Err(e) = &view.sequence {
        report.metadata.push(e.clone());
    }

    let Some((capacity, control)) = view.layout() else {
        return Ok(report);
    };

    let mut last_index: Option<i64> = None;
    for live in live_slots(&store, args, capacity, control)? {
        let bytes = match live.bytes {
            Ok(bytes) => bytes,
            Err(reason) => {
                report.damaged.push((live.slot, reason));
                continue;
            }
        };
        match EventRecord::decode(&bytes) {
            Ok(record) => {
                report.enveloped += 1;
                if last_index.is_some_and(|prev| record.index <= prev) {
                    report.out_of_order += 1;
                }
                last_index = Some(record.index);
            }
            Err(RecordError::NotEnveloped) => report.opaque += 1,
            Err(e) => report.damaged.push((live.slot, e.to_string())),
        }
    }

    Ok(report)
}

pub fn run(args: &QueueArgs) -> anyhow::Result<()> {
    println!("Verifying queue {}/{} in {}...", args.namespace, args.prefix, args.dir.display());
    let report = check(args)?;

    for problem in &report.metadata {
        println!("  metadata: {}", problem);
    }
    for (slot, reason) in &report.damaged {
        println!("  slot {}: {}", slot, reason);
    }
    if report.out_of_order > 0 {
        println!("  {} record(s) break index order", report.out_of_order);
    }
    println!(
        "  {} enveloped, {} opaque, {} damaged",
        report.enveloped,
        report.opaque,
        report.damaged.len()
    );

    if report.is_clean() {
        println!("✅ Queue is consistent");
        Ok(())
    } else {
        println!("❌ Queue is damaged");
        bail!("Queue verification failed");
    }
}
