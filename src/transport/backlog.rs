//! Offline Backlog
//!
//! Batches that no strategy accepted are kept in a small key-value store as a
//! JSON array under a fixed key, capped to the newest events. The next
//! transport reads the backlog once, clears it, and prepends it to its queue.
//!
//! The backlog is cleared on read, before redelivery is confirmed. A crash
//! between the read and a successful delivery loses those events.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::RumResult;
use crate::event::Event;

/// Storage key of the backlog
pub const OFFLINE_KEY: &str = "__RUM_OFFLINE_Q__";

/// Maximum number of events retained
pub const DEFAULT_BACKLOG_CAPACITY: usize = 2000;

/// Minimal durable string store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn KeyValueStore>;

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Per-application store under the platform data directory
    pub fn for_app(app_id: &str) -> Option<Self> {
        let base = dirs::data_local_dir().or_else(dirs::data_dir)?;
        Some(Self::new(base.join("rumkit").join(sanitize_segment(app_id))))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_segment(key)))
    }
}

fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Bounded, durable list of undelivered events
#[derive(Clone)]
pub struct OfflineBacklog {
    store: SharedStore,
    capacity: usize,
    // Serializes read-modify-write cycles on the stored key; shared by clones
    lock: Arc<Mutex<()>>,
}

impl OfflineBacklog {
    pub fn new(store: SharedStore, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read and clear the backlog. Storage or parse failures yield nothing.
    pub fn take(&self) -> Vec<Event> {
        let _guard = self.lock.lock();
        let raw = match self.store.get(OFFLINE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Offline backlog unreadable, skipping replay: {}", e);
                return Vec::new();
            }
        };

        let events = match serde_json::from_str::<Vec<Event>>(&raw) {
            Ok(events) => events,
            Err(e) => {
                warn!("Offline backlog corrupt, discarding: {}", e);
                Vec::new()
            }
        };

        if let Err(e) = self.store.remove(OFFLINE_KEY) {
            warn!("Failed to clear offline backlog after read: {}", e);
        }
        debug!("Replaying {} events from offline backlog", events.len());
        events
    }

    /// Non-destructive read
    pub fn peek(&self) -> RumResult<Vec<Event>> {
        match self.store.get(OFFLINE_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a failed batch, keeping only the newest `capacity` events.
    /// Returns the number of events now stored.
    pub fn persist(&self, batch: &[Event]) -> RumResult<usize> {
        let _guard = self.lock.lock();
        let mut stored = match self.store.get(OFFLINE_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<Event>>(&raw).unwrap_or_else(|e| {
                warn!("Offline backlog corrupt, overwriting: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        stored.extend_from_slice(batch);
        if stored.len() > self.capacity {
            let overflow = stored.len() - self.capacity;
            stored.drain(..overflow);
            debug!("Offline backlog over capacity, evicted {} oldest events", overflow);
        }

        self.store.set(OFFLINE_KEY, &serde_json::to_string(&stored)?)?;
        Ok(stored.len())
    }

    /// Drop everything stored
    pub fn clear(&self) -> RumResult<()> {
        let _guard = self.lock.lock();
        self.store.remove(OFFLINE_KEY)?;
        Ok(())
    }
}
