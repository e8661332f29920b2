//! Shared key-value store — decision cache and token revocation set.
//!
//! [`KvStore`] wraps a pooled Redis connection behind the three operations
//! the gateway needs (`GET`, `SETEX`, `EXISTS`). Access is deliberately
//! best-effort: a failed read is a miss, a failed write is a logged no-op.
//! The store only ever changes the latency profile of a request, never the
//! decision it receives.
//!
//! Two non-Redis backends exist for deployments without a store:
//! `memory` (an in-process map with per-key expiry, good for single-node dev
//! and tests) and `disabled` (every read misses, every write is dropped).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use redis::AsyncCommands;
use tracing::{debug, warn};

enum Backend {
    Redis(redis::aio::ConnectionManager),
    Memory(DashMap<String, (String, Instant)>),
    Disabled,
}

/// Pooled, shareable key-value store handle.
pub struct KvStore {
    backend: Backend,
}

impl KvStore {
    /// Connect according to the configured URL.
    ///
    /// A Redis URL that cannot be reached at startup degrades to the
    /// disabled backend with a warning — the gateway still routes, it just
    /// loses caching and revocation persistence until restart.
    pub async fn connect(url: &str) -> Self {
        match url {
            "memory" => Self::memory(),
            "disabled" | "" => Self::disabled(),
            _ => match Self::connect_redis(url).await {
                Ok(store) => store,
                Err(e) => {
                    warn!(error = %e, "key-value store unreachable — running without cache/revocation persistence");
                    Self::disabled()
                }
            },
        }
    }

    async fn connect_redis(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            backend: Backend::Redis(manager),
        })
    }

    /// In-process map with per-key expiry.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(DashMap::new()),
        }
    }

    /// Store that misses every read and drops every write.
    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.backend, Backend::Disabled)
    }

    /// `GET key` — `None` on miss, expiry, or store failure.
    pub async fn get(&self, key: &str) -> Option<String> {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        debug!(key, error = %e, "store read failed — treating as miss");
                        None
                    }
                }
            }
            Backend::Memory(map) => {
                let expired = match map.get(key) {
                    Some(entry) => {
                        let (value, expires_at) = entry.value();
                        if Instant::now() < *expires_at {
                            return Some(value.clone());
                        }
                        true
                    }
                    None => false,
                };
                if expired {
                    map.remove(key);
                }
                None
            }
            Backend::Disabled => None,
        }
    }

    /// `SETEX key ttl value` — fire-and-forget, failure logged at debug.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let ttl_secs = ttl.as_secs().max(1);
                if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
                    debug!(key, error = %e, "store write failed — dropped");
                }
            }
            Backend::Memory(map) => {
                map.insert(
                    key.to_string(),
                    (value.to_string(), Instant::now() + ttl),
                );
            }
            Backend::Disabled => {}
        }
    }

    /// `EXISTS key` — a failed lookup reads as absent, logged at warn since
    /// the revocation set depends on this call.
    pub async fn exists(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.exists::<_, bool>(key).await {
                    Ok(present) => present,
                    Err(e) => {
                        warn!(key, error = %e, "store EXISTS failed — treating as absent");
                        false
                    }
                }
            }
            Backend::Memory(map) => {
                let expired = match map.get(key) {
                    Some(entry) => {
                        if Instant::now() < entry.value().1 {
                            return true;
                        }
                        true
                    }
                    None => false,
                };
                if expired {
                    map.remove(key);
                }
                false
            }
            Backend::Disabled => false,
        }
    }
}
