//! Durable Mirror Module
//!
//! Pluggable namespaced key-value stores the cache mirrors its entries into.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, SyncError};

// == Durable Store Trait ==
/// Namespaced string store backing the cache mirror.
///
/// Calls are synchronous: the cache writes through on every mutation.
pub trait DurableStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>>;
}

// == Memory Store ==
/// In-process store, used by tests and ephemeral setups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, String>>>> {
        self.namespaces
            .lock()
            .map_err(|_| SyncError::Storage("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(namespace)
            .and_then(|ns| ns.get(key).cloned()))
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.lock()?
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        if let Some(ns) = self.lock()?.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// == File Store ==
/// One directory per namespace, one file per key.
///
/// File names are the hex-encoded key, so arbitrary key strings are safe on
/// any filesystem. Hex doubles the length: keys longer than
/// [`FileStore::MAX_KEY_BYTES`] cannot be mirrored and are refused with a
/// storage error (the cache keeps them in memory only).
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

const FILE_EXTENSION: &str = "json";
const MAX_FILE_NAME: usize = 255;

impl FileStore {
    /// Longest key whose file name fits the common 255-byte limit.
    pub const MAX_KEY_BYTES: usize = (MAX_FILE_NAME - FILE_EXTENSION.len() - 1) / 2;

    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(hex::encode(namespace))
    }

    fn key_path(&self, namespace: &str, key: &str) -> Result<PathBuf> {
        if key.len() > Self::MAX_KEY_BYTES {
            return Err(SyncError::Storage(format!(
                "key of {} bytes exceeds the file store limit of {}",
                key.len(),
                Self::MAX_KEY_BYTES
            )));
        }
        Ok(self
            .namespace_dir(namespace)
            .join(format!("{}.{}", hex::encode(key), FILE_EXTENSION)))
    }
}

impl DurableStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(namespace, key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(self.namespace_dir(namespace))?;
        let path = self.key_path(namespace, key)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(namespace, key)?) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = match fs::read_dir(self.namespace_dir(namespace)) {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for item in dir {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            // Foreign files that don't decode are not ours
            let decoded = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| hex::decode(stem).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(key) = decoded {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
