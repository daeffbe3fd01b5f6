// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! telemq-kv: file-backed key/value store for telemq queues.
pub mod entry;
pub mod error;
pub mod fixtures;
pub mod store;

pub use error::{EntryError, Result};
pub use store::FileStore;
