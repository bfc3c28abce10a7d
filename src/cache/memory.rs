use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hashbrown::HashMap;

use crate::{clock::Clock, types::Timestamp};

use super::ScoreboardCache;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Timestamp,
}

/// Process-local [`ScoreboardCache`] with per-entry expiry.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Creates an empty cache whose expiry follows `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScoreboardCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = self
            .clock
            .now_ms()
            .saturating_add(ttl.as_millis() as u64);
        self.lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn invalidate(&self, keys: &[String]) {
        let mut entries = self.lock();
        for key in keys {
            entries.remove(key.as_str());
        }
    }
}
