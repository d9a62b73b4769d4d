//! Errors raised while bootstrapping the service

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Logging setup error: {0}")]
    Logging(String),

    #[error("Database unavailable after {attempts} attempts: {source}")]
    DatabaseUnavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Core(#[from] confd_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
