//! Tracing subscriber setup

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::{Result, ServerError};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log span close events with their timings
    pub log_spans: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "router-confd".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self> {
        Ok(LoggingConfig {
            level: parse_log_level(&settings.level)?,
            json: settings.json,
            log_spans: settings.spans,
            ..Default::default()
        })
    }
}

/// Install the global subscriber; `RUST_LOG` directives refine the level
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events);

    if config.file_info {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    let installed = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| ServerError::Logging(e.to_string()))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| ServerError::Config(format!("Invalid log level: {}", level)))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_from_settings() {
        let config = LoggingConfig::from_settings(&LoggingSettings {
            level: "trace".into(),
            json: true,
            spans: true,
        })
        .unwrap();
        assert_eq!(config.level, Level::TRACE);
        assert!(config.json);
        assert!(config.log_spans);
        assert_eq!(config.app_name, "router-confd");
    }
}
