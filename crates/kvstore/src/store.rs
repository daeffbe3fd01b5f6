// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Directory-backed [`KvStore`].
//!
//! Layout: `<root>/<partition>/<namespace>/<key>.kv`. Each value is one checksummed
//! entry file (see [`crate::entry`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use telemq_core::{KvStore, StorageError};

use crate::entry::{read_entry, write_entry};

const ENTRY_EXT: &str = "kv";

pub struct FileStore {
    dir: PathBuf,
    // Serializes writers the way a flash driver serializes page programs.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) `partition` under `root`.
    pub fn open(root: impl AsRef<Path>, partition: &str) -> Result<Self, StorageError> {
        validate_component(partition)?;
        let dir = root.as_ref().join(partition);
        fs::create_dir_all(&dir)?;
        tracing::debug!("File store opened at {:?}", dir);
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys currently stored in `namespace`, sorted.
    pub fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        validate_component(namespace)?;
        let ns_dir = self.dir.join(namespace);
        let entries = match fs::read_dir(&ns_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_component(namespace)?;
        validate_component(key)?;
        Ok(self.dir.join(namespace).join(format!("{}.{}", key, ENTRY_EXT)))
    }
}

impl KvStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.entry_path(namespace, key)?;
        if !path.exists() {
            return Ok(None);
        }
        read_entry(&path)
            .map(Some)
            .map_err(|e| e.into_storage(namespace, key))
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.entry_path(namespace, key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(self.dir.join(namespace))?;
        write_entry(&path, value).map_err(|e| e.into_storage(namespace, key))
    }

    fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(namespace, key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_component(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if bad {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}
