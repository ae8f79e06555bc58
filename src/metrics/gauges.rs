//! Gauge metrics

use super::labels;

/// A driver task started
pub fn session_opened() {
    ::metrics::gauge!(labels::SESSIONS_OPEN).increment(1.0);
}

/// A driver task finished or was aborted
pub fn session_closed() {
    ::metrics::gauge!(labels::SESSIONS_OPEN).decrement(1.0);
}
