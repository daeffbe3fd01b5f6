// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event record envelope.
//!
//! Producers wrap their payload so the consumer can recover the sequence index without
//! understanding the payload itself.
//!
//! ```text
//! [magic: u8 = 0xE7][version: u8 = 1][index: i64 LE][len: u32 LE][payload: len bytes]
//! ```
//! Records that do not start with the magic byte are delivered as-is and carry no index.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{RecordError, RecordResult};

pub const RECORD_MAGIC: u8 = 0xE7;
pub const RECORD_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub index: i64,
    pub payload: Vec<u8>,
}

impl EventRecord {
    pub fn new(index: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            index,
            payload: payload.into(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(RECORD_MAGIC);
        buf.push(RECORD_VERSION);
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(bytes: &[u8]) -> RecordResult<Self> {
        let (index, len) = read_header(bytes)?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != len {
            return Err(RecordError::Truncated {
                declared: len,
                found: body.len(),
            });
        }
        Ok(Self {
            index,
            payload: body.to_vec(),
        })
    }
}

/// Returns the embedded sequence index, or `None` for opaque records.
pub fn peek_index(bytes: &[u8]) -> Option<i64> {
    EventRecord::decode(bytes).ok().map(|record| record.index)
}

fn read_header(bytes: &[u8]) -> RecordResult<(i64, usize)> {
    if bytes.first() != Some(&RECORD_MAGIC) {
        return Err(RecordError::NotEnveloped);
    }
    if bytes.len() < HEADER_LEN {
        return Err(RecordError::Truncated {
            declared: 0,
            found: bytes.len(),
        });
    }

    let mut cursor = Cursor::new(&bytes[1..HEADER_LEN]);
    let truncated = |_| RecordError::Truncated {
        declared: 0,
        found: bytes.len(),
    };
    let version = cursor.read_u8().map_err(truncated)?;
    if version != RECORD_VERSION {
        return Err(RecordError::Version(version));
    }
    let index = cursor.read_i64::<LittleEndian>().map_err(truncated)?;
    let len = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
    Ok((index, len as usize))
}
