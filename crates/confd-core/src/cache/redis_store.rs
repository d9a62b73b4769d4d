//! Redis-backed decision cache shared between service instances

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tracing::info;

use super::CacheStore;
use crate::{Error, Result};

impl From<RedisError> for Error {
    fn from(e: RedisError) -> Self {
        Error::Cache(e.to_string())
    }
}

/// Cache over a reconnecting redis connection
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
    ttl: Option<Duration>,
}

impl RedisCacheStore {
    /// Connect to `uri`, flushing the database first when `flush_on_connect`
    pub async fn connect(uri: &str, ttl: Option<Duration>, flush_on_connect: bool) -> Result<Self> {
        let client = Client::open(uri)?;
        let conn = ConnectionManager::new(client).await?;
        let store = Self { conn, ttl };
        if flush_on_connect {
            store.flush().await?;
            info!("Flushed redis cache on connect");
        }
        Ok(store)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
