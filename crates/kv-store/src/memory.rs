//! In-memory map backend: the dev fallback and outage mask.
//!
//! Single-instance and non-durable by design. Entries carry an optional
//! expiry instant checked lazily on read; expired entries are dropped there.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

pub(crate) struct MemoryKv {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryKv {
    pub(crate) fn new() -> Self {
        MemoryKv {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub(crate) async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) {
        let expires_at = ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s));
        self.entries
            .lock()
            .await
            .insert(key.to_string(), StoredValue { value, expires_at });
    }

    /// SETNX semantics over the map: succeeds only when the key is absent or
    /// its previous holder expired.
    pub(crate) async fn set_nx(&self, key: &str, value: String, ttl_seconds: u64) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.expired(now)) {
            return false;
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: Some(now + Duration::from_secs(ttl_seconds)),
            },
        );
        true
    }
}
