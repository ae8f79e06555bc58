//! Error types
//!
//! Every failure the provider reports falls into one of three families:
//! * [`ConfigError`]: the configuration source could not produce a usable config
//! * [`ConnectError`]: a session could not be opened
//! * [`QueryError`]: the health probe failed on an open session
//!
//! [`Error`] wraps all three so callers of the scoped helpers can use `?`
//! and still branch on the family. No message carries the password.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Configuration resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required key is absent or empty
    #[error("missing required configuration key `{key}`")]
    MissingKey {
        /// Name of the missing key
        key: &'static str,
    },

    /// The port is not an integer in 1..=65535
    #[error("invalid port `{value}`: expected an integer between 1 and 65535")]
    InvalidPort {
        /// Raw port text as supplied
        value: String,
    },

    /// A connection descriptor could not be parsed
    #[error("invalid connection target: {reason}")]
    InvalidTarget {
        /// What was wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }

    /// Stable identifier for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingKey { .. } => "config.missing_key",
            Self::InvalidPort { .. } => "config.invalid_port",
            Self::InvalidTarget { .. } => "config.invalid_target",
        }
    }
}

/// Session establishment failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The server could not be reached, or dropped the connection
    #[error("network unreachable ({endpoint}): {message}")]
    NetworkUnreachable {
        /// `host:port` that was dialed
        endpoint: String,
        /// Driver detail
        message: String,
    },

    /// The server refused the session during startup
    #[error("server rejected the session [{code}]: {message}")]
    AuthRejected {
        /// SQLSTATE reported by the server
        code: String,
        /// Server message
        message: String,
    },

    /// Connect and authentication did not finish in time
    #[error("connection attempt timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The peer does not speak the expected protocol
    #[error("protocol mismatch: {message}")]
    ProtocolMismatch {
        /// Driver detail
        message: String,
    },
}

impl ConnectError {
    /// Classify a driver error raised while opening a session.
    pub(crate) fn from_driver(err: &tokio_postgres::Error, endpoint: &str) -> Self {
        if let Some(db) = err.as_db_error() {
            return Self::AuthRejected {
                code: db.code().code().to_string(),
                message: db.message().to_string(),
            };
        }

        // Socket-level failures, including address resolution, carry this
        // prefix whatever their io kind
        if err.is_closed() || err.to_string().starts_with(CONNECT_FAILURE_PREFIX) {
            return Self::NetworkUnreachable {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            };
        }

        match io_source(err) {
            Some(io_err) if is_network_kind(io_err.kind()) => Self::NetworkUnreachable {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            },
            _ => Self::ProtocolMismatch {
                message: err.to_string(),
            },
        }
    }

    /// Stable identifier for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable { .. } => "connect.network_unreachable",
            Self::AuthRejected { .. } => "connect.auth_rejected",
            Self::Timeout { .. } => "connect.timeout",
            Self::ProtocolMismatch { .. } => "connect.protocol_mismatch",
        }
    }
}

/// Health probe failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The server rejected the statement, or the session is gone
    #[error("query execution failed: {message}")]
    ExecutionFailed {
        /// SQLSTATE, when the server reported one
        code: Option<String>,
        /// Server or driver message
        message: String,
    },

    /// The result was not exactly one row with one non-NULL text column
    #[error("unexpected result shape: {reason}")]
    UnexpectedResultShape {
        /// What was wrong with it
        reason: String,
    },

    /// The probe did not complete in time
    #[error("query timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },
}

impl QueryError {
    pub(crate) fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            code: None,
            message: message.into(),
        }
    }

    pub(crate) fn unexpected_shape(reason: impl Into<String>) -> Self {
        Self::UnexpectedResultShape {
            reason: reason.into(),
        }
    }

    pub(crate) fn from_driver(err: &tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Self::ExecutionFailed {
                code: Some(db.code().code().to_string()),
                message: db.message().to_string(),
            },
            None => Self::execution_failed(err.to_string()),
        }
    }

    /// Stable identifier for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionFailed { .. } => "query.execution_failed",
            Self::UnexpectedResultShape { .. } => "query.unexpected_result_shape",
            Self::Timeout { .. } => "query.timeout",
        }
    }
}

/// Any provider error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Configuration could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A session could not be opened
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The health probe failed
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl Error {
    /// Stable identifier for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(e) => e.kind(),
            Self::Connect(e) => e.kind(),
            Self::Query(e) => e.kind(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

// Display of tokio-postgres 0.7 `Kind::Connect`, which is not public;
// pinned by `test_connect_failure_prefix_matches_driver`
const CONNECT_FAILURE_PREFIX: &str = "error connecting to server";

fn io_source(err: &tokio_postgres::Error) -> Option<&io::Error> {
    std::error::Error::source(err)?.downcast_ref::<io::Error>()
}

/// Everything except framing and decoding problems is treated as a
/// transport failure.
fn is_network_kind(kind: io::ErrorKind) -> bool {
    !matches!(
        kind,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}
