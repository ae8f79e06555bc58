//! Connection provider

use super::handle::{ConnectionHandle, HealthCheckResult};
use super::state::ConnectionState;
use crate::client::{build_target, ConnectionTarget};
use crate::config::{resolve_config, ConfigSource, ConnectionConfig, EnvSource};
use crate::error::{ConfigError, ConnectError};
use crate::metrics::{counters, gauges, histograms};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_postgres::NoTls;
use tracing::Instrument;

/// Default `application_name` startup parameter
pub const DEFAULT_APPLICATION_NAME: &str = "pg-provider";

/// Default health probe
pub const DEFAULT_HEALTH_QUERY: &str = "SELECT version()";

/// Default time `release` waits for a graceful shutdown
pub const DEFAULT_RELEASE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub(crate) struct ProviderOptions {
    pub(crate) application_name: String,
    pub(crate) keepalive_idle: Option<Duration>,
    pub(crate) health_query: String,
    pub(crate) release_grace: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            keepalive_idle: None,
            health_query: DEFAULT_HEALTH_QUERY.to_string(),
            release_grace: DEFAULT_RELEASE_GRACE,
        }
    }
}

/// Turns a resolved configuration into verified database sessions
///
/// One provider owns one configuration and hands out at most one
/// [`ConnectionHandle`] at a time (the handle borrows the provider
/// mutably). There is no pooling and no retry: every `acquire` dials a
/// fresh session and every failure goes straight back to the caller.
///
/// A provider is single-owner. Sharing one between tasks requires
/// external synchronization such as a `tokio::sync::Mutex`.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> pg_provider::Result<()> {
/// use pg_provider::ConnectionProvider;
/// use std::time::Duration;
///
/// let mut provider = ConnectionProvider::from_env()?;
///
/// let mut handle = provider.acquire(Duration::from_secs(5)).await?;
/// let health = handle.health_check(Duration::from_secs(5)).await?;
/// println!("connected to {}", health.server_version());
/// handle.release().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionProvider {
    config: ConnectionConfig,
    target: ConnectionTarget,
    options: ProviderOptions,
    state: ConnectionState,
    sessions: Arc<AtomicUsize>,
}

impl ConnectionProvider {
    /// Provider with default options
    pub fn new(config: ConnectionConfig) -> Self {
        Self::builder(config).build()
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let provider = ConnectionProvider::builder(config)
    ///     .application_name("nightly-report")
    ///     .keepalive_idle(Duration::from_secs(60))
    ///     .build();
    /// ```
    pub fn builder(config: ConnectionConfig) -> ConnectionProviderBuilder {
        ConnectionProviderBuilder {
            config,
            options: ProviderOptions::default(),
        }
    }

    /// Resolve the configuration from `source` and build a provider with
    /// default options
    pub fn from_source(source: &impl ConfigSource) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(Self::resolve_config(source)?))
    }

    /// [`from_source`](Self::from_source) over the process environment
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    /// Read the five `POSTGRES_*` keys from `source`
    pub fn resolve_config(
        source: &impl ConfigSource,
    ) -> std::result::Result<ConnectionConfig, ConfigError> {
        resolve_config(source)
    }

    /// Build the target descriptor for `config`
    pub fn build_target(config: &ConnectionConfig) -> ConnectionTarget {
        build_target(config)
    }

    /// The configuration this provider was built from
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The target every `acquire` dials
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// State of the most recent session
    ///
    /// `Unopened` before the first `acquire`, `Failed` after a failed or
    /// cancelled one, `Closed` after release.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Driver tasks still running for sessions of this provider
    pub fn open_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Open and authenticate a new session.
    ///
    /// The whole connect, startup and authentication exchange is bounded by
    /// `timeout`. On failure, timeout, or cancellation of the returned
    /// future, any partially opened socket is closed and no handle exists.
    pub async fn acquire(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<ConnectionHandle<'_>, ConnectError> {
        let span = tracing::info_span!(
            "acquire",
            host = %self.target.host(),
            port = self.target.port(),
            database = %self.target.database(),
            user = %self.target.user()
        );

        let endpoint = self.target.endpoint();
        let driver_config = self
            .target
            .driver_config(&self.options.application_name, self.options.keepalive_idle);

        let mut opening = OpeningGuard::begin(&mut self.state);
        counters::connect_attempted();
        let started = Instant::now();

        let outcome = tokio::time::timeout(timeout, driver_config.connect(NoTls))
            .instrument(span.clone())
            .await;

        let (client, connection) = match outcome {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                return Err(connect_failed(
                    &span,
                    ConnectError::from_driver(&err, &endpoint),
                ))
            }
            Err(_) => {
                return Err(connect_failed(
                    &span,
                    ConnectError::Timeout { after: timeout },
                ))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        histograms::connect_duration(elapsed_ms);

        let session = SessionGuard::new(Arc::clone(&self.sessions));
        let driver = tokio::spawn(
            async move {
                let _session = session;
                if let Err(err) = connection.await {
                    tracing::debug!(error = %err, "connection driver exited with error");
                }
            }
            .instrument(span.clone()),
        );

        opening.opened();
        drop(opening);
        span.in_scope(|| tracing::info!(elapsed_ms, "connection established"));

        Ok(ConnectionHandle::new(
            client,
            driver,
            &mut self.state,
            &self.options,
        ))
    }

    /// Acquire, probe, and release in one scope.
    ///
    /// The session is released on every path, including a failed probe.
    pub async fn check(
        &mut self,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<HealthCheckResult> {
        let mut handle = self.acquire(connect_timeout).await?;
        let result = handle.health_check(query_timeout).await;
        handle.release().await;
        Ok(result?)
    }
}

/// Builder for creating `ConnectionProvider` with advanced options
///
/// # Examples
///
/// ```ignore
/// let provider = ConnectionProvider::builder(config)
///     .application_name("my_app")
///     .health_query("SELECT current_setting('server_version')")
///     .release_grace(Duration::from_secs(1))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionProviderBuilder {
    config: ConnectionConfig,
    options: ProviderOptions,
}

impl ConnectionProviderBuilder {
    /// Set application name for Postgres logs
    ///
    /// Default: `pg-provider`
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.options.application_name = name.into();
        self
    }

    /// Set TCP keepalive idle interval
    ///
    /// Default: None (driver default)
    pub fn keepalive_idle(mut self, duration: Duration) -> Self {
        self.options.keepalive_idle = Some(duration);
        self
    }

    /// Set the health probe
    ///
    /// Must be read-only and return one row with one text column.
    /// Default: `SELECT version()`
    pub fn health_query(mut self, query: impl Into<String>) -> Self {
        self.options.health_query = query.into();
        self
    }

    /// Set how long `release` waits for a graceful shutdown before aborting
    ///
    /// Default: 5 seconds
    pub fn release_grace(mut self, duration: Duration) -> Self {
        self.options.release_grace = duration;
        self
    }

    /// Build the provider
    pub fn build(self) -> ConnectionProvider {
        ConnectionProvider {
            target: build_target(&self.config),
            config: self.config,
            options: self.options,
            state: ConnectionState::Unopened,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn connect_failed(span: &tracing::Span, err: ConnectError) -> ConnectError {
    counters::connect_failed(err.kind());
    span.in_scope(|| tracing::warn!(kind = err.kind(), error = %err, "connection attempt failed"));
    err
}

/// Marks the session `Failed` unless it reached `Open`, including when the
/// acquire future is dropped mid-flight.
struct OpeningGuard<'a> {
    state: &'a mut ConnectionState,
}

impl<'a> OpeningGuard<'a> {
    fn begin(state: &'a mut ConnectionState) -> Self {
        *state = ConnectionState::Unopened;
        state.advance(ConnectionState::Opening);
        Self { state }
    }

    fn opened(&mut self) {
        self.state.advance(ConnectionState::Open);
    }
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if *self.state == ConnectionState::Opening {
            self.state.advance(ConnectionState::Failed);
        }
    }
}

/// Counts a running driver task; dropped when the task ends or is aborted.
struct SessionGuard {
    sessions: Arc<AtomicUsize>,
}

impl SessionGuard {
    fn new(sessions: Arc<AtomicUsize>) -> Self {
        sessions.fetch_add(1, Ordering::SeqCst);
        gauges::session_opened();
        Self { sessions }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.fetch_sub(1, Ordering::SeqCst);
        gauges::session_closed();
    }
}
