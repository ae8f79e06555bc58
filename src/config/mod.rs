//! Connection configuration
//!
//! Resolves the five `POSTGRES_*` keys from an injected [`ConfigSource`]
//! into an immutable [`ConnectionConfig`].

pub mod keys;
mod source;

pub use source::{ConfigSource, EnvSource};

use crate::error::ConfigError;

/// Resolved connection settings
///
/// All fields are non-empty and the port is non-zero. The password is only
/// reachable through [`ConnectionConfig::expose_password`] and is redacted
/// from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    user: String,
    password: String,
    host: String,
    port: u16,
    database: String,
}

impl ConnectionConfig {
    /// Build a configuration in code, applying the same checks as
    /// [`resolve_config`].
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            user: non_empty(keys::USER, user.into())?,
            password: non_empty(keys::PASSWORD, password.into())?,
            host: non_empty(keys::HOST, host.into())?,
            port,
            database: non_empty(keys::DATABASE, database.into())?,
        };
        if port == 0 {
            return Err(ConfigError::InvalidPort {
                value: port.to_string(),
            });
        }
        Ok(config)
    }

    /// Database user
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password. Never log this.
    pub fn expose_password(&self) -> &str {
        &self.password
    }

    /// Server host, IP address, or Unix socket directory
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Resolve a [`ConnectionConfig`] from `source`.
///
/// Presence of all five keys is checked first, in [`keys::REQUIRED`] order,
/// so a missing key is reported even when the port is also malformed. An
/// empty value counts as missing. Values are taken verbatim.
pub fn resolve_config(source: &impl ConfigSource) -> Result<ConnectionConfig, ConfigError> {
    let user = require(source, keys::USER)?;
    let password = require(source, keys::PASSWORD)?;
    let host = require(source, keys::HOST)?;
    let port = require(source, keys::PORT)?;
    let database = require(source, keys::DATABASE)?;

    let port = parse_port(&port)?;

    tracing::debug!(
        user = %user,
        host = %host,
        port = port,
        database = %database,
        "resolved connection config"
    );

    Ok(ConnectionConfig {
        user,
        password,
        host,
        port,
        database,
    })
}

fn require(source: &impl ConfigSource, key: &'static str) -> Result<String, ConfigError> {
    match source.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingKey { key }),
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingKey { key });
    }
    Ok(value)
}

/// Plain decimal digits only: no sign, no leading zeros.
pub(crate) fn parse_port(value: &str) -> Result<u16, ConfigError> {
    let canonical = value.bytes().all(|b| b.is_ascii_digit()) && !value.starts_with('0');
    match value.parse::<u16>() {
        Ok(port) if canonical && port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            value: value.to_string(),
        }),
    }
}
