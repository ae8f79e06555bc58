//! Connection management
//!
//! This module handles:
//! * Session lifecycle (acquire, health check, release)
//! * State machine enforcement
//! * Resource accounting for driver tasks

mod handle;
mod provider;
mod state;

pub use handle::{ConnectionHandle, HealthCheckResult};
pub use provider::{
    ConnectionProvider, ConnectionProviderBuilder, DEFAULT_APPLICATION_NAME,
    DEFAULT_HEALTH_QUERY, DEFAULT_RELEASE_GRACE,
};
pub use state::{ConnectionState, InvalidTransition};
