// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-disk entry format.
//!
//! ```text
//! [magic "TQKV"][version: u16][reserved: u16][len: u32][crc64(value): u64][value]
//! ```
//! Entries are replaced by writing `<name>.tmp`, syncing it, then renaming over the
//! old file, so a reader sees either the previous value or the new one.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use crc64fast::Digest;

use crate::error::{EntryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub len: u32,
    pub checksum: u64,
}

impl EntryHeader {
    pub const SIZE: usize = 4 + 2 + 2 + 4 + 8; // 20 bytes
    pub const MAGIC: [u8; 4] = *b"TQKV";
    pub const VERSION: u16 = 1;

    pub fn for_value(value: &[u8]) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            len: value.len() as u32,
            checksum: checksum(value),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        // buf[6..8] reserved
        buf[8..12].copy_from_slice(&self.len.to_le_bytes());
        buf[12..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != Self::MAGIC {
            return Err(EntryError::InvalidMagic);
        }

        let mut cursor = Cursor::new(&buf[4..]);
        let version = cursor.read_u16::<LittleEndian>()?;
        if version != Self::VERSION {
            return Err(EntryError::UnsupportedVersion(version));
        }
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()?;
        let checksum = cursor.read_u64::<LittleEndian>()?;

        Ok(Self {
            magic,
            version,
            len,
            checksum,
        })
    }
}

/// Atomically replaces the entry at `path` with `value`.
pub fn write_entry(path: &Path, value: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&EntryHeader::for_value(value).to_bytes())?;
        file.write_all(value)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Reads and verifies the entry at `path`.
pub fn read_entry(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let header = EntryHeader::read_from(&mut file)?;

    let mut value = Vec::with_capacity(header.len as usize);
    file.read_to_end(&mut value)?;
    if value.len() != header.len as usize {
        return Err(EntryError::LengthMismatch {
            declared: header.len as usize,
            found: value.len(),
        });
    }

    let found = checksum(&value);
    if found != header.checksum {
        return Err(EntryError::ChecksumMismatch {
            expected: header.checksum,
            found,
        });
    }
    Ok(value)
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(bytes);
    digest.sum64()
}
