// Durable key-value persistence for the client's local state.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to the on-disk layout of `KeyValueFile` require incrementing
// KV_STORAGE_VERSION below.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// --- Android Specific Imports ---
#[cfg(target_os = "android")]
use std::collections::HashMap;
#[cfg(target_os = "android")]
use std::sync::{Arc, OnceLock};

// --- Desktop Specific Imports ---
#[cfg(not(target_os = "android"))]
use fs2::FileExt;

// Version history:
// - v1: flat string map
const KV_STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Default)]
struct KeyValueFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

// --- Android Global Lock Map ---
#[cfg(target_os = "android")]
static ANDROID_FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// One change inside a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set(String, String),
    Remove(String),
    Clear,
}

/// A durable key-value primitive. Every `commit` is applied as a unit:
/// either all of its mutations become visible, or none do.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Snapshot of every stored entry.
    fn load(&self) -> Result<BTreeMap<String, String>>;

    /// Apply a batch atomically and return the resulting entries.
    fn commit(&self, batch: &[Mutation]) -> Result<BTreeMap<String, String>>;

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }
}

fn apply_batch(entries: &mut BTreeMap<String, String>, batch: &[Mutation]) {
    for mutation in batch {
        match mutation {
            Mutation::Set(k, v) => {
                entries.insert(k.clone(), v.clone());
            }
            Mutation::Remove(k) => {
                entries.remove(k);
            }
            Mutation::Clear => entries.clear(),
        }
    }
}

/// JSON file backend. Writes happen under an exclusive lock and go through
/// `LocalStorage::atomic_write`, so a crash mid-commit leaves the previous
/// content in place.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read without taking the lock; callers hold it.
    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        match serde_json::from_str::<KeyValueFile>(&json) {
            Ok(data) if data.version <= KV_STORAGE_VERSION => Ok(data.entries),
            Ok(data) => Err(anyhow::anyhow!(
                "Storage version {} is newer than supported version {}",
                data.version,
                KV_STORAGE_VERSION
            )),
            Err(e) => {
                // Nothing here is irreplaceable: a corrupt file reads as empty and
                // the next commit rewrites it.
                log::warn!(
                    "Discarding unreadable key-value file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        LocalStorage::with_lock(&self.path, || self.read_entries())
    }

    fn commit(&self, batch: &[Mutation]) -> Result<BTreeMap<String, String>> {
        LocalStorage::with_lock(&self.path, || {
            let mut entries = self.read_entries()?;
            apply_batch(&mut entries, batch);
            let data = KeyValueFile {
                version: KV_STORAGE_VERSION,
                entries,
            };
            let json = serde_json::to_string_pretty(&data)?;
            LocalStorage::atomic_write(&self.path, json)?;
            Ok(data.entries)
        })
    }
}

/// In-process backend for tests and for hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("key-value store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn commit(&self, batch: &[Mutation]) -> Result<BTreeMap<String, String>> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("key-value store lock poisoned"))?;
        let mut next = guard.clone();
        apply_batch(&mut next, batch);
        *guard = next.clone();
        Ok(next)
    }
}

pub struct LocalStorage;

impl LocalStorage {
    /// Helper to get a sidecar lock file path (Desktop only)
    #[cfg(not(target_os = "android"))]
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    // --- DESKTOP IMPLEMENTATION (fs2) ---
    #[cfg(not(target_os = "android"))]
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    // --- ANDROID IMPLEMENTATION (In-Memory Mutex) ---
    #[cfg(target_os = "android")]
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let map_mutex = ANDROID_FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));

        // Canonicalize to avoid race conditions via symlinks or relative paths
        let key = file_path.canonicalize().unwrap_or(file_path.to_path_buf());

        let file_mutex = {
            let mut map = map_mutex
                .lock()
                .map_err(|_| anyhow::anyhow!("file lock map poisoned"))?;
            map.entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let _guard = file_mutex
            .lock()
            .map_err(|_| anyhow::anyhow!("file lock poisoned"))?;
        f()
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}
