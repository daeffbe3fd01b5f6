// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Read-only view of a queue as it sits on disk.
//!
//! Nothing here opens a `RingBuffer`, because opening repairs damaged state and
//! the tools must report what they find rather than fix it silently.
use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use telemq_core::config::{
    CAPACITY_KEY_SUFFIX, DEFAULT_CONTROL_KEY, DEFAULT_NAMESPACE, DEFAULT_RING_PREFIX,
    DEFAULT_SEQUENCE_KEY,
};
use telemq_core::ring::ControlWord;
use telemq_core::{KvStore, KvStoreExt, SequenceState};
use telemq_kv::FileStore;

/// Locates one queue inside a data directory.
#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Data directory holding the store partitions.
    #[arg(long, short, default_value = "telemq-data")]
    pub dir: PathBuf,

    #[arg(long, default_value = "nvs")]
    pub partition: String,

    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Slot key prefix.
    #[arg(long, default_value = DEFAULT_RING_PREFIX)]
    pub prefix: String,

    #[arg(long, default_value = DEFAULT_CONTROL_KEY)]
    pub control_key: String,

    #[arg(long, default_value = DEFAULT_SEQUENCE_KEY)]
    pub sequence_key: String,
}

impl QueueArgs {
    /// Queue with default key names under `dir`.
    pub fn at(dir: impl Into<PathBuf>, partition: &str) -> Self {
        Self {
            dir: dir.into(),
            partition: partition.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            prefix: DEFAULT_RING_PREFIX.to_string(),
            control_key: DEFAULT_CONTROL_KEY.to_string(),
            sequence_key: DEFAULT_SEQUENCE_KEY.to_string(),
        }
    }

    pub fn capacity_key(&self) -> String {
        format!("{}{}", self.control_key, CAPACITY_KEY_SUFFIX)
    }

    pub fn slot_key(&self, slot: u16) -> String {
        format!("{}{}", self.prefix, slot)
    }

    /// Opens an existing partition. Refuses to create a fresh one.
    pub fn open_store(&self) -> anyhow::Result<FileStore> {
        let partition_dir = self.dir.join(&self.partition);
        if !partition_dir.is_dir() {
            bail!("No store partition at {}", partition_dir.display());
        }
        Ok(FileStore::open(&self.dir, &self.partition)?)
    }
}

/// What the store holds for one queue. Corruption is captured as text per field.
pub struct QueueView {
    pub capacity: Result<Option<u16>, String>,
    pub control: Result<Option<ControlWord>, String>,
    pub sequence: Result<Option<SequenceState>, String>,
    pub keys: Vec<String>,
}

impl QueueView {
    pub fn load(store: &FileStore, args: &QueueArgs) -> anyhow::Result<Self> {
        let ns = args.namespace.as_str();

        let capacity = match store.get_u16(ns, &args.capacity_key()) {
            Ok(found) => Ok(found),
            Err(e) if e.is_corrupt() => Err(e.to_string()),
            Err(e) => return Err(e.into()),
        };

        let control = match store.get(ns, &args.control_key) {
            Ok(Some(bytes)) => ControlWord::from_bytes(&bytes)
                .and_then(|word| match &capacity {
                    Ok(Some(cap)) if *cap > 0 => word.validate(*cap).map(|_| word),
                    _ => Ok(word),
                })
                .map(Some)
                .map_err(|e| e.to_string()),
            Ok(None) => Ok(None),
            Err(e) if e.is_corrupt() => Err(e.to_string()),
            Err(e) => return Err(e.into()),
        };

        let sequence = match store.get(ns, &args.sequence_key) {
            Ok(Some(bytes)) => SequenceState::decode(ns, &args.sequence_key, &bytes)
                .map(Some)
                .map_err(|e| e.to_string()),
            Ok(None) => Ok(None),
            Err(e) if e.is_corrupt() => Err(e.to_string()),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            capacity,
            control,
            sequence,
            keys: store.keys(ns)?,
        })
    }

    /// Capacity and control word when both are present and consistent.
    pub fn layout(&self) -> Option<(u16, ControlWord)> {
        match (&self.capacity, &self.control) {
            (Ok(Some(cap)), Ok(Some(word))) if *cap > 0 => Some((*cap, *word)),
            _ => None,
        }
    }
}

/// Raw contents of one live slot, oldest first.
pub struct LiveSlot {
    pub position: u16,
    pub slot: u16,
    pub bytes: Result<Vec<u8>, String>,
}

/// Reads every live slot from tail to head without touching the control word.
pub fn live_slots(
    store: &FileStore,
    args: &QueueArgs,
    capacity: u16,
    control: ControlWord,
) -> anyhow::Result<Vec<LiveSlot>> {
    let size = control.size(capacity);
    let mut slots = Vec::with_capacity(size as usize);
    for position in 0..size {
        let slot = ((control.tail as u32 + position as u32) % capacity as u32) as u16;
        let bytes = match store.get(&args.namespace, &args.slot_key(slot)) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err("slot is missing".to_string()),
            Err(e) if e.is_corrupt() => Err(e.to_string()),
            Err(e) => return Err(e.into()),
        };
        slots.push(LiveSlot { position, slot, bytes });
    }
    Ok(slots)
}
