//! Cache-aside storage of routing and auth decisions
//!
//! Entries are the JSON encoding of the computed result, negative results
//! included. Invalidation is all-or-nothing through [`DecisionCache::invalidate_all`].

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisCacheStore;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::AuthRequest;
use crate::routing::RoutingRequest;
use crate::Result;

/// Key-value backend holding serialized decisions
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Drop every entry
    async fn flush(&self) -> Result<()>;
}

/// Shared handle over a [`CacheStore`]
#[derive(Clone)]
pub struct DecisionCache {
    store: Arc<dyn CacheStore>,
    /// Bumped on every flush; results computed across a flush are not stored
    generation: Arc<AtomicU64>,
}

impl DecisionCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the cached value for `key`, or run `compute` and store its result
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(raw) = self.store.get(key).await? {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "Decision cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Discarding undecodable cache entry"),
            }
        }

        debug!(key, "Decision cache miss");
        let generation = self.generation.load(Ordering::SeqCst);
        let value = compute().await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(key, "Cache flushed during compute, not storing result");
            return Ok(value);
        }
        self.store.set(key, serde_json::to_string(&value)?).await?;
        // a flush that started before the set may have completed before it
        if self.generation.load(Ordering::SeqCst) != generation {
            self.store.remove(key).await?;
        }
        Ok(value)
    }

    pub async fn invalidate_all(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.flush().await?;
        info!("Decision cache flushed");
        Ok(())
    }
}

/// Cache key of an auth decision; the password is never part of it
pub fn auth_key(request: &AuthRequest) -> String {
    let fields = serde_json::json!([
        request.source_ip,
        request.source_port,
        request.domain,
        request.username,
    ]);
    format!("auth:{}", fields)
}

/// Cache key of a routing decision
pub fn routing_key(request: &RoutingRequest) -> String {
    let fields = serde_json::json!([
        request.auth,
        request.source_ip,
        request.source_port,
        request.domain,
        request.username,
        request.from_name,
        request.from_uri,
        request.to_name,
        request.to_uri,
    ]);
    format!("routing:{}", fields)
}
