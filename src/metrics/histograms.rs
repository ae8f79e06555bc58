//! Histogram metrics

use super::labels;

/// Time from dial to ready-for-query, in milliseconds
pub fn connect_duration(duration_ms: u64) {
    ::metrics::histogram!(labels::CONNECT_DURATION).record(duration_ms as f64);
}

/// Health probe round trip, in milliseconds
pub fn health_check_duration(outcome: &'static str, duration_ms: u64) {
    ::metrics::histogram!(labels::HEALTH_CHECK_DURATION, "outcome" => outcome)
        .record(duration_ms as f64);
}
