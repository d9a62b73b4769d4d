//! Service configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional file,
//! `ROUTER_CONFD__SECTION__KEY` environment variables, command line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, ServerError};

pub const ENV_PREFIX: &str = "ROUTER_CONFD";

/// Command line of the `router-confd` binary
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "router-confd", version, about = "Routing control plane for the SIP proxy")]
pub struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Database URI, e.g. sqlite://router-confd.db?mode=rwc
    #[arg(long)]
    pub database_uri: Option<String>,

    /// Decision cache URI: memory:// or redis://host:port/db
    #[arg(long)]
    pub cache_uri: Option<String>,

    /// Log level filter (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log in JSON format
    #[arg(long)]
    pub log_json: bool,

    /// Per request timeout in milliseconds; 0 disables it
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Unset or zero means no timeout
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub uri: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Startup attempts before giving up
    pub connect_attempts: u32,
    pub retry_interval_ms: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub uri: String,
    pub flush_on_connect: bool,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    pub max_capacity: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_seconds.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Log span close events with their timings
    #[serde(default)]
    pub spans: bool,
}

impl Settings {
    /// Load the layered configuration for `cli`
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9600)?
            .set_default("database.uri", "sqlite://router-confd.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_ms", 30_000)?
            .set_default("database.connect_attempts", 300)?
            .set_default("database.retry_interval_ms", 1000)?
            .set_default("database.run_migrations", true)?
            .set_default("cache.uri", "memory://")?
            .set_default("cache.flush_on_connect", true)?
            .set_default("cache.max_capacity", 100_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("logging.spans", false)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", cli.host.clone())?
            .set_override_option("server.port", cli.port.map(i64::from))?
            .set_override_option("server.request_timeout_ms", cli.request_timeout_ms.map(|ms| ms as i64))?
            .set_override_option("database.uri", cli.database_uri.clone())?
            .set_override_option("cache.uri", cli.cache_uri.clone())?
            .set_override_option("logging.level", cli.log_level.clone())?;
        if cli.log_json {
            builder = builder.set_override("logging.json", true)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(ServerError::Config("database.max_connections must be positive".into()));
        }
        if self.database.connect_attempts == 0 {
            return Err(ServerError::Config("database.connect_attempts must be positive".into()));
        }
        if !self.cache.uri.starts_with("memory://") && !self.cache.uri.starts_with("redis://") {
            return Err(ServerError::Config(format!("unsupported cache uri {}", self.cache.uri)));
        }
        Ok(())
    }
}
