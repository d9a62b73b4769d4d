//! In-process decision cache

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::CacheStore;
use crate::Result;

/// Bounded moka cache, optionally expiring entries after `ttl`
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Cache<String, String>,
}

impl MemoryCacheStore {
    pub fn new(max_capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }
}
