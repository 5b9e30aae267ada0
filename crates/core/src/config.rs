//! Backend option bags and configuration errors.
//!
//! Backends are selected by name at startup and receive an [`Options`] bag.
//! Each backend converts the bag into its own typed configuration exactly
//! once, rejecting missing and unknown keys there.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

/// Configuration error raised while constructing a backend. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the {0} option must be specified")]
    MissingOption(String),

    #[error("unknown option '{key}' for backend '{backend}'")]
    UnknownOption { backend: String, key: String },

    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("no backend registered under the name '{0}'")]
    UnknownBackend(String),

    #[error("malformed configuration document: {0}")]
    Malformed(String),
}

/// String-keyed option bag handed to backend constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a required option.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingOption(key.to_string()))
    }

    /// Parse an optional option.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::InvalidOption {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Reject keys outside `allowed`.
    pub fn ensure_known(&self, backend: &str, allowed: &[&str]) -> Result<(), ConfigError> {
        match self.keys().find(|k| !allowed.contains(k)) {
            Some(key) => Err(ConfigError::UnknownOption {
                backend: backend.to_string(),
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Read a flat JSON object. Strings, numbers and booleans are accepted as
    /// values.
    pub fn from_json_str(doc: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(doc).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::Malformed("expected a JSON object".to_string()))?;

        let mut options = Options::new();
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(ConfigError::InvalidOption {
                        key: key.clone(),
                        reason: format!("unsupported value {other}"),
                    });
                }
            };
            options.insert(key.clone(), value);
        }
        Ok(options)
    }

    /// Collect environment variables starting with `prefix`.
    ///
    /// `TAPEVAULT_INV_CLEANING_PREFIX` with prefix `TAPEVAULT_INV_` becomes
    /// the `cleaning-prefix` option.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(std::env::vars(), prefix)
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>, prefix: &str) -> Self {
        vars.into_iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(prefix)?;
                if key.is_empty() {
                    return None;
                }
                Some((key.to_ascii_lowercase().replace('_', "-"), value))
            })
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Options
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_key() {
        let options = Options::new().with("dbhost", "localhost");
        assert_eq!(options.require("dbhost").unwrap(), "localhost");
        assert_eq!(
            options.require("dbname"),
            Err(ConfigError::MissingOption("dbname".to_string()))
        );
        assert_eq!(
            ConfigError::MissingOption("dbname".to_string()).to_string(),
            "the dbname option must be specified"
        );
    }

    #[test]
    fn parse_reports_invalid_values() {
        let options = Options::new().with("port", "5432").with("slots", "many");
        assert_eq!(options.parse::<u16>("port").unwrap(), Some(5432));
        assert_eq!(options.parse::<u16>("absent").unwrap(), None);
        assert!(matches!(
            options.parse::<u32>("slots"),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let options = Options::new().with("dbhost", "h").with("dbhots", "typo");
        assert_eq!(
            options.ensure_known("postgres", &["dbhost"]),
            Err(ConfigError::UnknownOption {
                backend: "postgres".to_string(),
                key: "dbhots".to_string(),
            })
        );
    }

    #[test]
    fn json_documents() {
        let options =
            Options::from_json_str(r#"{"dbhost": "db", "port": 5432, "tls": false}"#).unwrap();
        assert_eq!(options.get("dbhost"), Some("db"));
        assert_eq!(options.get("port"), Some("5432"));
        assert_eq!(options.get("tls"), Some("false"));

        assert!(matches!(
            Options::from_json_str("[1, 2]"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            Options::from_json_str(r#"{"nested": {"a": 1}}"#),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn environment_keys_are_kebab_cased() {
        let vars = vec![
            ("TAPEVAULT_INV_DBHOST".to_string(), "db".to_string()),
            ("TAPEVAULT_INV_CLEANING_PREFIX".to_string(), "CLN".to_string()),
            ("TAPEVAULT_INV_".to_string(), "ignored".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let options = Options::from_vars(vars, "TAPEVAULT_INV_");
        assert_eq!(options.get("dbhost"), Some("db"));
        assert_eq!(options.get("cleaning-prefix"), Some("CLN"));
        assert_eq!(options.keys().count(), 2);
    }
}
