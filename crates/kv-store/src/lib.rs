#![deny(warnings)]

//! TTL'd key-value storage shim.
//!
//! Three backends, tried once at startup in priority order:
//!
//! 1. REST KV (Upstash-style HTTP API): `KV_REST_API_URL` + `KV_REST_API_TOKEN`
//! 2. Raw Redis: `REDIS_URL`
//! 3. In-memory map: explicit single-instance dev fallback, non-durable
//!
//! TTL-only expiry; no eviction policy, no transactions. Get/set failures on
//! a real backend are logged and masked by the in-memory fallback so a KV
//! outage degrades rather than breaks the game. Lock acquisition does NOT
//! fall back: a process-local lock cannot exclude other instances.

mod memory;
mod redis_kv;
mod rest;

use memory::MemoryKv;
use redis_kv::RedisKv;
use rest::RestKv;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Storage-layer failures. Most call sites never see these: get/set mask
/// backend errors via the memory fallback, and only `probe` propagates.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("rest kv error: {0}")]
    Rest(String),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

enum Backend {
    Rest(RestKv),
    Redis(RedisKv),
    Memory,
}

/// Handle to the configured KV store. Cheap to clone only via `Arc` at the
/// application layer; internally holds one backend plus the memory fallback.
pub struct KvStore {
    backend: Backend,
    fallback: MemoryKv,
}

/// Result of a write-then-read probe, for the debug endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub backend: &'static str,
    pub wrote: bool,
    pub read_back: bool,
}

impl KvStore {
    /// Pick a backend from the environment. Falls back to the in-memory map
    /// (with a warning) when nothing is configured or Redis refuses to
    /// connect.
    pub async fn from_env() -> Self {
        if let (Ok(url), Ok(token)) = (
            std::env::var("KV_REST_API_URL"),
            std::env::var("KV_REST_API_TOKEN"),
        ) {
            tracing::info!("kv: using REST backend");
            return KvStore {
                backend: Backend::Rest(RestKv::new(url, token)),
                fallback: MemoryKv::new(),
            };
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            match RedisKv::connect(&url).await {
                Ok(redis) => {
                    tracing::info!("kv: using Redis backend");
                    return KvStore {
                        backend: Backend::Redis(redis),
                        fallback: MemoryKv::new(),
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "kv: Redis connect failed, using memory fallback");
                }
            }
        } else {
            tracing::warn!("kv: no backend configured, using in-memory store (dev only)");
        }

        Self::memory()
    }

    /// Purely in-memory store. Single-instance, non-durable; for dev/tests.
    pub fn memory() -> Self {
        KvStore {
            backend: Backend::Memory,
            fallback: MemoryKv::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Rest(_) => "rest",
            Backend::Redis(_) => "redis",
            Backend::Memory => "memory",
        }
    }

    /// Fetch and deserialize a JSON value. Returns `None` for missing keys,
    /// expired entries, and unparseable payloads (a corrupt entry reads as
    /// absent). Backend failures log a warning and fall back to the memory
    /// map.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match &self.backend {
            Backend::Rest(rest) => match rest.get(key).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(key, error = %e, "kv: REST get failed, memory fallback");
                    self.fallback.get(key).await
                }
            },
            Backend::Redis(redis) => match redis.get(key).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(key, error = %e, "kv: Redis get failed, memory fallback");
                    self.fallback.get(key).await
                }
            },
            Backend::Memory => self.fallback.get(key).await,
        };

        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "kv: stored value failed to parse, treating as absent");
                None
            }
        }
    }

    /// Serialize and store a JSON value with an optional TTL in seconds.
    /// Backend failures log a warning and land in the memory fallback.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(key, error = %e, "kv: value failed to serialize, dropping write");
                return;
            }
        };

        match &self.backend {
            Backend::Rest(rest) => {
                if let Err(e) = rest.set(key, &raw, ttl_seconds).await {
                    tracing::warn!(key, error = %e, "kv: REST set failed, memory fallback");
                    self.fallback.set(key, raw, ttl_seconds).await;
                }
            }
            Backend::Redis(redis) => {
                if let Err(e) = redis.set(key, &raw, ttl_seconds).await {
                    tracing::warn!(key, error = %e, "kv: Redis set failed, memory fallback");
                    self.fallback.set(key, raw, ttl_seconds).await;
                }
            }
            Backend::Memory => self.fallback.set(key, raw, ttl_seconds).await,
        }
    }

    /// Best-effort distributed lock: a single SETNX with TTL. Returns the
    /// lock token on success, `None` when someone else holds it or the
    /// backend call fails. No renewal, no fencing; a crashed holder simply
    /// lets the TTL expire.
    pub async fn try_acquire_lock(&self, key: &str, ttl_seconds: u64) -> Option<String> {
        let token = Uuid::new_v4().to_string();
        let acquired = match &self.backend {
            Backend::Rest(rest) => match rest.set_nx(key, &token, ttl_seconds).await {
                Ok(ok) => ok,
                Err(e) => {
                    tracing::warn!(key, error = %e, "kv: REST lock acquire failed");
                    false
                }
            },
            Backend::Redis(redis) => match redis.set_nx(key, &token, ttl_seconds).await {
                Ok(ok) => ok,
                Err(e) => {
                    tracing::warn!(key, error = %e, "kv: Redis lock acquire failed");
                    false
                }
            },
            Backend::Memory => self.fallback.set_nx(key, token.clone(), ttl_seconds).await,
        };
        acquired.then_some(token)
    }

    /// Write-then-read round trip against the live backend.
    pub async fn probe(&self, key: &str) -> Result<ProbeReport, KvError> {
        let payload = format!("{{\"ok\":true,\"token\":\"{}\"}}", Uuid::new_v4());
        match &self.backend {
            Backend::Rest(rest) => {
                rest.set(key, &payload, Some(120)).await?;
                let read = rest.get(key).await?;
                Ok(ProbeReport {
                    backend: "rest",
                    wrote: true,
                    read_back: read.as_deref() == Some(payload.as_str()),
                })
            }
            Backend::Redis(redis) => {
                redis.set(key, &payload, Some(120)).await?;
                let read = redis.get(key).await?;
                Ok(ProbeReport {
                    backend: "redis",
                    wrote: true,
                    read_back: read.as_deref() == Some(payload.as_str()),
                })
            }
            Backend::Memory => {
                self.fallback.set(key, payload.clone(), Some(120)).await;
                let read = self.fallback.get(key).await;
                Ok(ProbeReport {
                    backend: "memory",
                    wrote: true,
                    read_back: read.as_deref() == Some(payload.as_str()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        n: u32,
    }

    #[tokio::test]
    async fn memory_roundtrip() {
        let store = KvStore::memory();
        assert_eq!(store.get_json::<Doc>("k").await, None);
        store.set_json("k", &Doc { n: 7 }, None).await;
        assert_eq!(store.get_json::<Doc>("k").await, Some(Doc { n: 7 }));
    }

    #[tokio::test]
    async fn memory_ttl_expires() {
        let store = KvStore::memory();
        store.set_json("k", &Doc { n: 1 }, Some(0)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get_json::<Doc>("k").await, None);
    }

    #[tokio::test]
    async fn corrupt_value_reads_as_absent() {
        let store = KvStore::memory();
        store.set_json("k", &"not a doc", None).await;
        assert_eq!(store.get_json::<Doc>("k").await, None);
    }

    #[tokio::test]
    async fn lock_excludes_second_caller_until_expiry() {
        let store = KvStore::memory();
        let token = store.try_acquire_lock("lock", 60).await;
        assert!(token.is_some());
        assert!(store.try_acquire_lock("lock", 60).await.is_none());

        // An expired lock can be re-acquired.
        let store = KvStore::memory();
        assert!(store.try_acquire_lock("lock", 0).await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.try_acquire_lock("lock", 60).await.is_some());
    }

    #[tokio::test]
    async fn probe_round_trips() {
        let store = KvStore::memory();
        let report = store.probe("probe-key").await.unwrap();
        assert_eq!(report.backend, "memory");
        assert!(report.wrote);
        assert!(report.read_back);
    }
}
