// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Default number of slots in a ring.
pub const DEFAULT_CAPACITY: u16 = 256;

/// Maximum size in bytes of a single record slot.
pub const MAX_RECORD_SIZE: usize = 1024;

/// Longest key the flash KV backend accepts (NVS limit).
pub const MAX_KEY_LEN: usize = 15;

/// Default KV namespace for queue state.
pub const DEFAULT_NAMESPACE: &str = "telemq";

/// Default slot key prefix; slot `n` is stored under `"ev{n}"`.
pub const DEFAULT_RING_PREFIX: &str = "ev";

/// Default key of the ring control word.
pub const DEFAULT_CONTROL_KEY: &str = "ev_ctrl";

/// Suffix appended to the control key to form the capacity key.
pub const CAPACITY_KEY_SUFFIX: &str = "_cap";

/// Default key of the persisted sequence state blob.
pub const DEFAULT_SEQUENCE_KEY: &str = "seq_state";

/// Default number of records per published batch.
pub const DEFAULT_BATCH_CAP: usize = 10;
