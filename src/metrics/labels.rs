//! Metric names and label values

/// Connect attempts
pub const CONNECT_ATTEMPTS: &str = "pg_provider_connect_attempts_total";

/// Connect failures, labelled by error kind
pub const CONNECT_FAILURES: &str = "pg_provider_connect_failures_total";

/// Health checks, labelled by outcome
pub const HEALTH_CHECKS: &str = "pg_provider_health_checks_total";

/// Releases, labelled by mode
pub const RELEASES: &str = "pg_provider_releases_total";

/// Connect latency in milliseconds
pub const CONNECT_DURATION: &str = "pg_provider_connect_duration_ms";

/// Health check latency in milliseconds
pub const HEALTH_CHECK_DURATION: &str = "pg_provider_health_check_duration_ms";

/// Sessions whose driver task is still running
pub const SESSIONS_OPEN: &str = "pg_provider_sessions_open";

/// Successful outcome
pub const OUTCOME_OK: &str = "ok";

/// Failed outcome
pub const OUTCOME_ERROR: &str = "error";

/// Driver task finished after Terminate
pub const RELEASE_GRACEFUL: &str = "graceful";

/// Driver task aborted
pub const RELEASE_ABORTED: &str = "aborted";
