//! Managed Postgres connection provider
//!
//! `pg-provider` turns five environment keys into a verified database
//! session:
//!
//! 1. [`resolve_config`] reads `POSTGRES_USER`, `POSTGRES_PASSWORD`,
//!    `POSTGRES_HOST`, `POSTGRES_PORT` and `POSTGRES_DB` from an injected
//!    [`ConfigSource`].
//! 2. [`build_target`] turns the config into a [`ConnectionTarget`], whose
//!    URL form percent-encodes every component.
//! 3. [`ConnectionProvider::acquire`] opens one session under a timeout.
//! 4. [`ConnectionHandle::health_check`] runs `SELECT version()`.
//! 5. [`ConnectionHandle::release`] closes it; dropping the handle does too.
//!
//! Failures are typed ([`ConfigError`], [`ConnectError`], [`QueryError`])
//! and never include the password. Nothing is retried internally.
//!
//! ```no_run
//! # async fn example() -> pg_provider::Result<()> {
//! use pg_provider::ConnectionProvider;
//! use std::time::Duration;
//!
//! let mut provider = ConnectionProvider::from_env()?;
//! let health = provider
//!     .check(Duration::from_secs(5), Duration::from_secs(5))
//!     .await?;
//! println!("{}", health.server_version());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;

pub use client::{build_target, ConnectionTarget, TransportType};
pub use config::{resolve_config, ConfigSource, ConnectionConfig, EnvSource};
pub use connection::{
    ConnectionHandle, ConnectionProvider, ConnectionProviderBuilder, ConnectionState,
    HealthCheckResult,
};
pub use error::{ConfigError, ConnectError, Error, QueryError, Result};
