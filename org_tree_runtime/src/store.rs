//! Key-value store — the persistence substrate for trees, avatars and
//! contracts.
//!
//! Two backends:
//!   - `MemoryStore`: in-process map with an optional byte quota
//!   - `FileStore`:   one file per key, fsync after every write
//!
//! Rules:
//!   - Values are UTF-8 strings (JSON documents or image data URLs)
//!   - A missing key reads as `None`, deleting a missing key is not an error
//!   - A refused write leaves the previous value in place

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{Result, RuntimeError};

/// String-keyed persistence used by every repository in this crate.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory store. With a quota, usage is the sum of key and value bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes,
        }
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> Result<usize> {
        let entries = self.entries.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(entries.iter().map(|(k, v)| k.len() + v.len()).sum())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| RuntimeError::LockPoisoned)?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let available = quota.saturating_sub(used - replaced);
            let needed = key.len() + value.len();
            if needed > available {
                return Err(RuntimeError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// Directory-backed store: `<dir>/<encoded key>.kv`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open or create the store directory.
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path holding `key`. Bytes outside `[A-Za-z0-9_-]` are
    /// percent-encoded so keys cannot escape the directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.kv", encode_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temporary sibling, fsync, then rename over the old value.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("kv.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
