//! Live session handle

use super::provider::ProviderOptions;
use super::state::ConnectionState;
use crate::error::QueryError;
use crate::metrics::{counters, histograms, labels};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, SimpleQueryMessage};

/// Outcome of a successful health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    server_version: String,
}

impl HealthCheckResult {
    /// Version string exactly as the server returned it
    pub fn server_version(&self) -> &str {
        &self.server_version
    }
}

/// An open database session
///
/// Obtained from [`ConnectionProvider::acquire`](super::ConnectionProvider::acquire)
/// and mutably borrowing the provider, so a provider has at most one handle
/// at a time. Dropping the handle closes the socket even if
/// [`release`](Self::release) was never awaited.
pub struct ConnectionHandle<'p> {
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
    state: &'p mut ConnectionState,
    options: &'p ProviderOptions,
    opened_at: Instant,
}

impl<'p> ConnectionHandle<'p> {
    pub(crate) fn new(
        client: Client,
        driver: JoinHandle<()>,
        state: &'p mut ConnectionState,
        options: &'p ProviderOptions,
    ) -> Self {
        Self {
            client: Some(client),
            driver: Some(driver),
            state,
            options,
            opened_at: Instant::now(),
        }
    }

    /// Current lifecycle state (`Open` or `Closed`)
    pub fn state(&self) -> ConnectionState {
        *self.state
    }

    /// Whether the session can still be used
    pub fn is_open(&self) -> bool {
        *self.state == ConnectionState::Open
    }

    /// Time since the session was established
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// The underlying driver client, while the session is open
    pub fn client(&self) -> Option<&Client> {
        if self.is_open() {
            self.client.as_ref()
        } else {
            None
        }
    }

    /// Run the read-only health query and return the server version.
    ///
    /// Exactly one row with one non-NULL column is accepted. If the probe
    /// outlives `timeout`, or the session drops underneath it, the handle is
    /// closed because the protocol state is no longer known.
    pub async fn health_check(&mut self, timeout: Duration) -> Result<HealthCheckResult, QueryError> {
        let client = match (self.is_open(), self.client.as_ref()) {
            (true, Some(client)) => client,
            _ => {
                return Err(QueryError::execution_failed(format!(
                    "connection is {}",
                    self.state
                )))
            }
        };

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(timeout, client.simple_query(&self.options.health_query)).await;

        let result = match outcome {
            Ok(Ok(messages)) => parse_version(messages),
            Ok(Err(err)) => {
                let session_lost = client.is_closed();
                let err = QueryError::from_driver(&err);
                if session_lost {
                    self.abort();
                }
                Err(err)
            }
            Err(_) => {
                self.abort();
                Err(QueryError::Timeout { after: timeout })
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(health) => {
                counters::health_check_completed(labels::OUTCOME_OK);
                histograms::health_check_duration(labels::OUTCOME_OK, elapsed_ms);
                tracing::debug!(
                    elapsed_ms,
                    server_version = %health.server_version,
                    "health check passed"
                );
            }
            Err(err) => {
                counters::health_check_completed(labels::OUTCOME_ERROR);
                histograms::health_check_duration(labels::OUTCOME_ERROR, elapsed_ms);
                tracing::warn!(elapsed_ms, kind = err.kind(), error = %err, "health check failed");
            }
        }

        result
    }

    /// Close the session.
    ///
    /// Idempotent: a handle that is already closed is left alone. The
    /// driver gets `release_grace` to send Terminate and shut the socket
    /// down before it is aborted.
    pub async fn release(&mut self) {
        if !self.is_open() {
            tracing::debug!(state = %self.state, "release on inactive handle ignored");
            return;
        }

        self.state.advance(ConnectionState::Closed);
        drop(self.client.take());

        // Stays in `self.driver` while waiting so a cancelled release still aborts in Drop
        let graceful = match self.driver.as_mut() {
            Some(driver) => tokio::time::timeout(self.options.release_grace, driver)
                .await
                .is_ok(),
            None => true,
        };

        if let Some(driver) = self.driver.take() {
            if graceful {
                counters::release_completed(labels::RELEASE_GRACEFUL);
            } else {
                driver.abort();
                counters::release_completed(labels::RELEASE_ABORTED);
            }
        }

        tracing::debug!(
            graceful,
            age_ms = self.opened_at.elapsed().as_millis() as u64,
            "connection released"
        );
    }

    /// Tear the session down without waiting for the driver
    fn abort(&mut self) {
        drop(self.client.take());
        if let Some(driver) = self.driver.take() {
            driver.abort();
            counters::release_completed(labels::RELEASE_ABORTED);
        }
        if self.is_open() {
            self.state.advance(ConnectionState::Closed);
        }
    }
}

impl Drop for ConnectionHandle<'_> {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::debug!("connection handle dropped without release");
        }
        self.abort();
    }
}

impl std::fmt::Debug for ConnectionHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("state", &self.state)
            .field("age", &self.age())
            .finish()
    }
}

fn parse_version(messages: Vec<SimpleQueryMessage>) -> Result<HealthCheckResult, QueryError> {
    let rows: Vec<_> = messages
        .into_iter()
        .filter_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect();

    let row = match rows.as_slice() {
        [row] => row,
        _ => {
            return Err(QueryError::unexpected_shape(format!(
                "expected exactly one row, got {}",
                rows.len()
            )))
        }
    };

    if row.len() != 1 {
        return Err(QueryError::unexpected_shape(format!(
            "expected exactly one column, got {}",
            row.len()
        )));
    }

    match row.get(0) {
        Some(version) => Ok(HealthCheckResult {
            server_version: version.to_string(),
        }),
        None => Err(QueryError::unexpected_shape("version column is NULL")),
    }
}
