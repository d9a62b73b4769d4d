//! Composition root: database, cache and router wiring

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use confd_core::cache::{DecisionCache, MemoryCacheStore};
use confd_core::store::SqliteConfigStore;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::api::{self, ApiState};
use crate::config::{CacheSettings, DatabaseSettings, Settings};
use crate::error::{Result, ServerError};

/// Everything `main` needs to serve and later shut down
pub struct Application {
    pub router: Router,
    pub store: SqliteConfigStore,
}

async fn try_connect(options: SqlitePoolOptions, uri: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    let pool = options.connect(uri).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}

/// Connect with a fixed-interval bounded retry, then migrate if configured
pub async fn connect_database(settings: &DatabaseSettings) -> Result<SqliteConfigStore> {
    let options = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms));
    let interval = Duration::from_millis(settings.retry_interval_ms);

    let mut attempt = 0;
    let pool = loop {
        attempt += 1;
        match try_connect(options.clone(), &settings.uri).await {
            Ok(pool) => break pool,
            Err(e) if attempt < settings.connect_attempts => {
                warn!(attempt, max_attempts = settings.connect_attempts, error = %e, "Database not ready, retrying");
                tokio::time::sleep(interval).await;
            }
            Err(source) => {
                return Err(ServerError::DatabaseUnavailable {
                    attempts: attempt,
                    source,
                });
            }
        }
    };
    info!(attempts = attempt, "Connected to database");

    let store = SqliteConfigStore::from_pool(pool);
    if settings.run_migrations {
        store.migrate().await?;
    }
    Ok(store)
}

/// Build the decision cache selected by `settings.uri`
pub async fn build_cache(settings: &CacheSettings) -> Result<DecisionCache> {
    if settings.uri.starts_with("redis://") {
        return redis_cache(settings).await;
    }

    info!(max_capacity = settings.max_capacity, ttl = ?settings.ttl(), "Using in-process decision cache");
    let store = MemoryCacheStore::new(settings.max_capacity, settings.ttl());
    Ok(DecisionCache::new(Arc::new(store)))
}

#[cfg(feature = "redis")]
async fn redis_cache(settings: &CacheSettings) -> Result<DecisionCache> {
    use confd_core::cache::RedisCacheStore;

    let store = RedisCacheStore::connect(&settings.uri, settings.ttl(), settings.flush_on_connect).await?;
    info!(uri = %settings.uri, "Using redis decision cache");
    Ok(DecisionCache::new(Arc::new(store)))
}

#[cfg(not(feature = "redis"))]
async fn redis_cache(settings: &CacheSettings) -> Result<DecisionCache> {
    Err(ServerError::Config(format!(
        "cache uri {} needs the `redis` feature",
        settings.uri
    )))
}

pub async fn build(settings: &Settings) -> Result<Application> {
    let store = connect_database(&settings.database).await?;
    let cache = build_cache(&settings.cache).await?;

    let state = ApiState::new(Arc::new(store.clone()), cache);
    let router = api::create_router(state, settings.server.request_timeout());

    Ok(Application { router, store })
}
