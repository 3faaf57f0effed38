//! Artifact storage injected into every index.
//!
//! `FsStore` keeps one file per artifact under a cache root and replaces files
//! atomically (temp file in the same directory, then rename), so readers never
//! observe a half-written artifact. `MemoryStore` backs tests.

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

pub trait Store: Send + Sync {
    /// Read an artifact. Missing or unreadable artifacts yield `Error::CacheUnavailable`.
    fn read(&self, key: &str) -> Result<Vec<u8>>;
    /// Replace an artifact. On failure the previous content stays valid.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;
    /// Remove an artifact; removing a missing artifact is not an error.
    fn remove(&self, key: &str) -> Result<()>;
    fn contains(&self, key: &str) -> bool;
}

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn path_for(&self, key: &str) -> PathBuf { self.root.join(key) }
}

impl Store for FsStore {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        std::fs::read(self.path_for(key)).map_err(|e| Error::cache_unavailable(key, e))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        debug!(artifact = key, bytes = bytes.len(), root = %self.root.display(), "artifact written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> bool { self.path_for(key).is_file() }
}

#[derive(Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.artifacts.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.artifacts.read().get(key).cloned().ok_or_else(|| Error::cache_unavailable(key, "not found"))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.artifacts.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.artifacts.write().remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> bool { self.artifacts.read().contains_key(key) }
}

pub fn put_bincode<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| Error::Serialization(format!("{key}: {e}")))?;
    store.write(key, &bytes)
}

pub fn get_bincode<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<T> {
    let bytes = store.read(key)?;
    bincode::deserialize(&bytes).map_err(|e| Error::cache_unavailable(key, format!("corrupt: {e}")))
}

pub fn put_json<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Serialization(format!("{key}: {e}")))?;
    store.write(key, &bytes)
}

pub fn get_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<T> {
    let bytes = store.read(key)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::cache_unavailable(key, format!("corrupt: {e}")))
}
