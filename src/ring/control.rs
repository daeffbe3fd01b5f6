// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ring control word.
//!
//! # Layout (16 bytes, little endian)
//! ```text
//! [version: u8][flags: u8][head: u16][tail: u16][reserved: u16][crc64: u64]
//! ```
//! `flags` bit 0 is `full`; all other bits must be zero. The checksum covers bytes 0..8.

use crc64fast::Digest;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Invalid length: expected {expected}, found {found}")]
    Length { expected: usize, found: usize },

    #[error("Unsupported version {0}")]
    Version(u8),

    #[error("Checksum mismatch: expected {expected}, found {found}")]
    Checksum { expected: u64, found: u64 },

    #[error("Unknown flag bits 0x{0:02x}")]
    Flags(u8),

    #[error("Pointers out of range: head={head} tail={tail} capacity={capacity}")]
    OutOfRange { head: u16, tail: u16, capacity: u16 },

    #[error("Full flag set with head {head} != tail {tail}")]
    FullMismatch { head: u16, tail: u16 },
}

/// Persisted head/tail/full triple of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlWord {
    pub head: u16,
    pub tail: u16,
    pub full: bool,
}

impl ControlWord {
    pub const SIZE: usize = 16;
    const VERSION: u8 = 1;
    const FLAG_FULL: u8 = 0x01;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = Self::VERSION;
        buf[1] = if self.full { Self::FLAG_FULL } else { 0 };
        buf[2..4].copy_from_slice(&self.head.to_le_bytes());
        buf[4..6].copy_from_slice(&self.tail.to_le_bytes());
        // buf[6..8] reserved
        let checksum = checksum(&buf[0..8]);
        buf[8..16].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ControlError> {
        let buf: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| ControlError::Length {
            expected: Self::SIZE,
            found: bytes.len(),
        })?;

        let mut stored = [0u8; 8];
        stored.copy_from_slice(&buf[8..16]);
        let expected = u64::from_le_bytes(stored);
        let found = checksum(&buf[0..8]);
        if expected != found {
            return Err(ControlError::Checksum { expected, found });
        }

        if buf[0] != Self::VERSION {
            return Err(ControlError::Version(buf[0]));
        }
        let flags = buf[1];
        if flags & !Self::FLAG_FULL != 0 {
            return Err(ControlError::Flags(flags));
        }

        Ok(Self {
            head: u16::from_le_bytes([buf[2], buf[3]]),
            tail: u16::from_le_bytes([buf[4], buf[5]]),
            full: flags & Self::FLAG_FULL != 0,
        })
    }

    /// Checks the pointer invariants against a ring of `capacity` slots.
    pub fn validate(&self, capacity: u16) -> Result<(), ControlError> {
        if self.head >= capacity || self.tail >= capacity {
            return Err(ControlError::OutOfRange {
                head: self.head,
                tail: self.tail,
                capacity,
            });
        }
        if self.full && self.head != self.tail {
            return Err(ControlError::FullMismatch {
                head: self.head,
                tail: self.tail,
            });
        }
        Ok(())
    }

    pub fn size(&self, capacity: u16) -> u16 {
        if self.full {
            capacity
        } else {
            let cap = capacity as u32;
            ((self.head as u32 + cap - self.tail as u32) % cap) as u16
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(bytes);
    digest.sum64()
}
