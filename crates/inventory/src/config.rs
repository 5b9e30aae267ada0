//! Typed backend configuration.
//!
//! Option bags are converted here exactly once; backends only ever see the
//! typed structs.

use std::fmt;

use sqlx::postgres::PgConnectOptions;

use tapevault_core::{ConfigError, Options};

fn cleaning_prefix(options: &Options) -> Result<String, ConfigError> {
    let prefix = options.require("cleaning-prefix")?;
    if prefix.is_empty() {
        return Err(ConfigError::InvalidOption {
            key: "cleaning-prefix".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(prefix.to_string())
}

/// Configuration of the Postgres backend.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: String,
    pub password: String,
    /// Serials starting with this prefix are cleaning cartridges.
    pub cleaning_prefix: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    const BACKEND: &'static str = "postgres";
    const REQUIRED: [&'static str; 5] = ["dbhost", "dbname", "username", "password", "cleaning-prefix"];
    const OPTIONAL: [&'static str; 2] = ["port", "max-connections"];

    pub const DEFAULT_PORT: u16 = 5432;
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        for key in Self::REQUIRED {
            options.require(key)?;
        }
        let allowed: Vec<&str> = Self::REQUIRED.iter().chain(Self::OPTIONAL.iter()).copied().collect();
        options.ensure_known(Self::BACKEND, &allowed)?;

        Ok(Self {
            host: options.require("dbhost")?.to_string(),
            port: options.parse("port")?.unwrap_or(Self::DEFAULT_PORT),
            dbname: options.require("dbname")?.to_string(),
            username: options.require("username")?.to_string(),
            password: options.require("password")?.to_string(),
            cleaning_prefix: cleaning_prefix(options)?,
            max_connections: options
                .parse("max-connections")?
                .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.username)
            .password(&self.password)
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cleaning_prefix", &self.cleaning_prefix)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Configuration of the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub cleaning_prefix: String,
}

impl MemoryConfig {
    const BACKEND: &'static str = "memory";

    pub fn new(cleaning_prefix: impl Into<String>) -> Self {
        Self {
            cleaning_prefix: cleaning_prefix.into(),
        }
    }

    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        let cleaning_prefix = cleaning_prefix(options)?;
        options.ensure_known(Self::BACKEND, &["cleaning-prefix"])?;
        Ok(Self { cleaning_prefix })
    }
}
