//! Counter metrics

use super::labels;

/// A connect attempt started
pub fn connect_attempted() {
    ::metrics::counter!(labels::CONNECT_ATTEMPTS).increment(1);
}

/// A connect attempt failed with `kind`
pub fn connect_failed(kind: &'static str) {
    ::metrics::counter!(labels::CONNECT_FAILURES, "kind" => kind).increment(1);
}

/// A health check finished with `outcome`
pub fn health_check_completed(outcome: &'static str) {
    ::metrics::counter!(labels::HEALTH_CHECKS, "outcome" => outcome).increment(1);
}

/// A handle was released; `mode` is graceful or aborted
pub fn release_completed(mode: &'static str) {
    ::metrics::counter!(labels::RELEASES, "mode" => mode).increment(1);
}
