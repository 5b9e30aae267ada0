//! Tracing/logging initialization.
//!
//! Output goes through a `tracing-subscriber` fmt layer filtered by
//! `RUST_LOG` (default `info`). JSON is the default format; set
//! `TAPEVAULT_LOG_FORMAT=pretty` for human-readable output.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const FORMAT_VAR: &str = "TAPEVAULT_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format '{0}' (expected 'json' or 'pretty')")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Read the format from `TAPEVAULT_LOG_FORMAT`. Unrecognised values fall
    /// back to JSON.
    pub fn from_env() -> Self {
        let format = std::env::var(FORMAT_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Install the global subscriber. Returns `false` if one was already set.
    pub fn install(&self) -> bool {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.default_filter));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(tracing_subscriber::fmt::time::SystemTime);

        match self.format {
            LogFormat::Json => builder.json().with_target(false).try_init().is_ok(),
            LogFormat::Pretty => builder.pretty().try_init().is_ok(),
        }
    }
}

/// Initialize tracing/logging for the process from the environment.
pub fn init() {
    let _ = LogConfig::from_env().install();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(
            "xml".parse::<LogFormat>(),
            Err(UnknownLogFormat("xml".to_string()))
        );
    }

    #[test]
    fn init_is_idempotent() {
        let config = LogConfig::default()
            .with_format(LogFormat::Pretty)
            .with_default_filter("debug");
        config.install();
        assert!(!config.install());
        init();
    }
}
