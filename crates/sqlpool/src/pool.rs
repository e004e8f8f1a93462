//! Connection pool implementation.
//!
//! A simple, synchronous, thread-safe pool. All bookkeeping lives in one
//! [`PoolState`] behind a single mutex; callers that find the pool saturated
//! block on a condition variable that every release notifies.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::{DataSourceConfig, PoolConfig, parse_properties};
use crate::connection::{ConnectionFactory, IsolationLevel};
use crate::error::PoolError;
use crate::lifecycle::{self, ConnectionId};
use crate::pooled::{PoolEntry, PooledConnection};
use crate::state::{PoolMetrics, PoolState, PoolStatus};

/// A bounded pool of reusable database connections.
///
/// The pool opens real connections through a [`ConnectionFactory`] and
/// hands them out as [`PooledConnection`]s. Closing or dropping a pooled
/// connection returns it to the pool.
///
/// `Pool` is a cheap handle; clones share the same connections.
///
/// # Example
///
/// ```rust,ignore
/// use sqlpool::{DataSourceConfig, Pool};
///
/// let data_source = DataSourceConfig::new()
///     .url("postgres://localhost/app")
///     .username("app")
///     .password("secret");
///
/// let pool = Pool::builder(connect)
///     .data_source(data_source)
///     .max_active_connections(20)
///     .ping_enabled(true)
///     .ping_query("SELECT 1")
///     .build()?;
///
/// let mut conn = pool.get()?;
/// conn.execute("UPDATE accounts SET active = true")?;
/// conn.close()?;
/// ```
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

pub(crate) struct PoolInner<F: ConnectionFactory> {
    factory: F,

    /// Pool bookkeeping. The only shared mutable state of the pool.
    state: Mutex<PoolState<F::Connection>>,

    /// Notified whenever a connection is returned, reclaimed or closed.
    available: Condvar,

    /// When the pool was created.
    created_at: Instant,
}

type Entry<F> = Arc<PoolEntry<<F as ConnectionFactory>::Connection>>;

impl<F: ConnectionFactory> Pool<F> {
    /// Create a new pool builder around a connection factory.
    #[must_use]
    pub fn builder(factory: F) -> PoolBuilder<F> {
        PoolBuilder::new(factory)
    }

    /// Create a new pool with the given configuration.
    ///
    /// No connection is opened until the first call to [`Pool::get`].
    pub fn new(
        factory: F,
        data_source: DataSourceConfig,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        tracing::info!(
            url = ?data_source.url,
            max_active = config.max_active_connections,
            max_idle = config.max_idle_connections,
            "connection pool created"
        );

        let inner = Arc::new(PoolInner {
            factory,
            state: Mutex::new(PoolState::new(data_source, config)),
            available: Condvar::new(),
            created_at: Instant::now(),
        });

        Ok(Self { inner })
    }

    /// Create a pool from a `key=value;key=value` property string holding
    /// both data source and pool settings.
    pub fn from_properties(factory: F, props: &str) -> Result<Self, PoolError> {
        let (data_source, config) = parse_properties(props)?;
        Self::new(factory, data_source, config)
    }

    /// Get a connection from the pool.
    ///
    /// Returns an idle connection if there is one, opens a new one if the
    /// pool is below its active limit, reclaims the oldest checked-out
    /// connection if it is overdue, and otherwise blocks until a connection
    /// is released. Each wait lasts at most the configured time to wait,
    /// after which the pool is examined again. A zero time to wait blocks
    /// until another caller releases a connection.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ExhaustedRetries`] if too many bad connections were
    ///   found during this call
    /// - [`PoolError::WaitInterrupted`] if the pool was closed while waiting
    /// - [`PoolError::PoolClosed`] if the pool was already closed
    /// - [`PoolError::Connect`] if opening a new connection failed
    pub fn get(&self) -> Result<PooledConnection<F>, PoolError> {
        let entry = self.inner.pop_connection()?;
        Ok(PooledConnection::new(entry, Arc::clone(&self.inner)))
    }

    /// Close every active and idle connection.
    ///
    /// Checked-out handles become invalid. The pool stays usable and opens
    /// new connections on demand.
    pub fn force_close_all(&self) {
        let mut state = self.inner.state.lock();
        self.inner.force_close_all(&mut state);
    }

    /// Shut the pool down.
    ///
    /// All connections are closed, callers blocked in [`Pool::get`] fail with
    /// [`PoolError::WaitInterrupted`], and later calls fail with
    /// [`PoolError::PoolClosed`].
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.inner.force_close_all(&mut state);
        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.inner.state.lock().status()
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.state.lock().metrics()
    }

    /// Time since the pool was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    /// Get a copy of the pool configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.inner.state.lock().config.clone()
    }

    /// Get a copy of the data source configuration.
    #[must_use]
    pub fn data_source(&self) -> DataSourceConfig {
        self.inner.state.lock().data_source.clone()
    }

    /// Connection type code connections must carry to be pooled again.
    #[must_use]
    pub fn expected_type_code(&self) -> u64 {
        self.inner.state.lock().expected_type_code
    }

    /// Replace the data source configuration. Closes all connections.
    pub fn set_data_source(&self, data_source: DataSourceConfig) -> Result<(), PoolError> {
        self.reconfigure(|ds, _| *ds = data_source)
    }

    /// Replace the pool configuration. Closes all connections.
    pub fn set_pool_config(&self, config: PoolConfig) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| *cfg = config)
    }

    /// Change the driver identity. Closes all connections.
    pub fn set_driver(&self, driver: impl Into<String>) -> Result<(), PoolError> {
        let driver = driver.into();
        self.reconfigure(|ds, _| ds.driver = Some(driver))
    }

    /// Change the connection URL. Closes all connections.
    pub fn set_url(&self, url: impl Into<String>) -> Result<(), PoolError> {
        let url = url.into();
        self.reconfigure(|ds, _| ds.url = Some(url))
    }

    /// Change the login name. Closes all connections.
    pub fn set_username(&self, username: impl Into<String>) -> Result<(), PoolError> {
        let username = username.into();
        self.reconfigure(|ds, _| ds.username = Some(username))
    }

    /// Change the login password. Closes all connections.
    pub fn set_password(&self, password: impl Into<String>) -> Result<(), PoolError> {
        let password = password.into();
        self.reconfigure(|ds, _| ds.password = Some(password))
    }

    /// Change the autocommit mode of new connections. Closes all connections.
    pub fn set_default_auto_commit(&self, auto_commit: bool) -> Result<(), PoolError> {
        self.reconfigure(|ds, _| ds.auto_commit = Some(auto_commit))
    }

    /// Change the isolation level of new connections. Closes all connections.
    pub fn set_default_transaction_isolation(
        &self,
        level: Option<IsolationLevel>,
    ) -> Result<(), PoolError> {
        self.reconfigure(|ds, _| ds.default_transaction_isolation = level)
    }

    /// Replace the driver properties. Closes all connections.
    pub fn set_driver_properties(
        &self,
        properties: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), PoolError> {
        let properties = properties.into_iter().collect();
        self.reconfigure(|ds, _| ds.driver_properties = properties)
    }

    /// Change the maximum number of active connections. Closes all connections.
    pub fn set_max_active_connections(&self, count: u32) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.max_active_connections = count)
    }

    /// Change the maximum number of idle connections. Closes all connections.
    pub fn set_max_idle_connections(&self, count: u32) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.max_idle_connections = count)
    }

    /// Change the maximum checkout time. Closes all connections.
    pub fn set_max_checkout_time(&self, time: Duration) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.max_checkout_time = time)
    }

    /// Change the time to wait per acquisition attempt. Closes all connections.
    pub fn set_time_to_wait(&self, time: Duration) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.time_to_wait = time)
    }

    /// Enable or disable the ping query. Closes all connections.
    pub fn set_ping_enabled(&self, enabled: bool) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.ping_enabled = enabled)
    }

    /// Change the ping query. Closes all connections.
    pub fn set_ping_query(&self, query: impl Into<String>) -> Result<(), PoolError> {
        let query = query.into();
        self.reconfigure(|_, cfg| cfg.ping_query = query)
    }

    /// Change the idle threshold for pinging. Closes all connections.
    pub fn set_ping_connections_not_used_for(&self, time: Duration) -> Result<(), PoolError> {
        self.reconfigure(|_, cfg| cfg.ping_connections_not_used_for = time)
    }

    /// Change the per-acquisition bad connection tolerance.
    ///
    /// Unlike the other setters this keeps existing connections.
    pub fn set_max_local_bad_connection_tolerance(&self, count: u32) {
        self.inner.state.lock().config.max_local_bad_connection_tolerance = count;
    }

    /// Apply a configuration change and invalidate every connection, as one
    /// atomic step under the pool lock.
    fn reconfigure(
        &self,
        update: impl FnOnce(&mut DataSourceConfig, &mut PoolConfig),
    ) -> Result<(), PoolError> {
        let mut state = self.inner.state.lock();
        let mut data_source = state.data_source.clone();
        let mut config = state.config.clone();
        update(&mut data_source, &mut config);
        config.validate()?;

        state.data_source = data_source;
        state.config = config;
        self.inner.force_close_all(&mut state);
        Ok(())
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    /// Check a connection out of the pool.
    fn pop_connection(&self) -> Result<Entry<F>, PoolError> {
        let started = Instant::now();
        let mut counted_wait = false;
        let mut local_bad_connection_count: u32 = 0;
        let mut acquired: Option<Entry<F>> = None;

        tracing::trace!("acquiring connection from pool");

        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::PoolClosed);
        }

        while acquired.is_none() {
            let candidate = if let Some(entry) = state.idle.pop_front() {
                tracing::debug!(connection_id = %entry.id(), "checked out connection from pool");
                entry
            } else if state.has_active_capacity() {
                self.open_connection(&mut state)?
            } else if let Some(entry) = self.claim_overdue(&mut state) {
                entry
            } else {
                if !counted_wait {
                    state.counters.had_to_wait_count += 1;
                    counted_wait = true;
                }
                let time_to_wait = state.config.time_to_wait;
                tracing::debug!(
                    wait_ms = u64::try_from(time_to_wait.as_millis()).unwrap_or(u64::MAX),
                    "waiting for connection"
                );
                let wait_started = Instant::now();
                if time_to_wait.is_zero() {
                    // Zero means no timeout: sleep until a release notifies.
                    self.available.wait(&mut state);
                } else {
                    self.available.wait_for(&mut state, time_to_wait);
                }
                state.counters.accumulated_wait_time += wait_started.elapsed();
                if state.closed {
                    return Err(PoolError::WaitInterrupted);
                }
                continue;
            };

            if Self::prepare_for_checkout(&state, &candidate) {
                candidate.stamp_checkout(state.expected_type_code, Instant::now());
                state.active.push(Arc::clone(&candidate));
                state.counters.request_count += 1;
                state.counters.accumulated_request_time += started.elapsed();
                acquired = Some(candidate);
            } else {
                tracing::debug!(
                    connection_id = %candidate.id(),
                    "a bad connection was returned from the pool, getting another connection"
                );
                state.counters.bad_connection_count += 1;
                local_bad_connection_count += 1;
                state.discard(&candidate);

                if local_bad_connection_count > state.config.bad_connection_limit() {
                    tracing::debug!("could not get a good connection to the database");
                    return Err(PoolError::ExhaustedRetries {
                        attempts: local_bad_connection_count,
                    });
                }
            }
        }

        acquired.ok_or_else(|| {
            tracing::debug!("the connection pool returned no connection");
            PoolError::InvalidState("the connection pool returned no connection".into())
        })
    }

    /// Validate a candidate and clear any transaction state left on it.
    fn prepare_for_checkout(state: &PoolState<F::Connection>, candidate: &Entry<F>) -> bool {
        if !candidate.is_valid(&state.config) {
            return false;
        }
        match candidate.with_real(lifecycle::rollback_unless_auto_commit) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection_id = %candidate.id(), error = %e, "rollback failed at checkout");
                false
            }
        }
    }

    /// Open and wrap a brand-new real connection.
    fn open_connection(&self, state: &mut PoolState<F::Connection>) -> Result<Entry<F>, PoolError> {
        let id = ConnectionId::next();

        let mut conn = self
            .factory
            .connect(&state.data_source)
            .map_err(|e| PoolError::Connect(Box::new(e)))?;

        if let Err(e) = lifecycle::initialize(&mut conn, &state.data_source) {
            lifecycle::discard(&mut conn, id);
            return Err(PoolError::Connect(Box::new(e)));
        }

        state.counters.connections_created += 1;
        tracing::debug!(connection_id = %id, "created connection");
        Ok(Arc::new(PoolEntry::new(conn, id)))
    }

    /// Take the oldest active connection away from its holder if it has been
    /// checked out longer than the maximum checkout time.
    fn claim_overdue(&self, state: &mut PoolState<F::Connection>) -> Option<Entry<F>> {
        let checkout_time = state.active.first()?.checkout_time();
        if checkout_time <= state.config.max_checkout_time {
            return None;
        }

        let oldest = state.active.remove(0);
        oldest.invalidate();

        let counters = &mut state.counters;
        counters.claimed_overdue_connection_count += 1;
        counters.accumulated_checkout_time_of_overdue_connections += checkout_time;
        counters.accumulated_checkout_time += checkout_time;

        let id = oldest.id();
        if let Err(e) = oldest.with_real(lifecycle::rollback_unless_auto_commit) {
            // The holder may have left the connection broken. It is still
            // wrapped and validated like any other candidate.
            tracing::debug!(connection_id = %id, error = %e, "bad connection, could not roll back");
        }

        let entry = Arc::new(oldest.rewrap(oldest.metadata().last_used_at));
        self.available.notify_all();
        tracing::debug!(
            connection_id = %id,
            checkout_ms = u64::try_from(checkout_time.as_millis()).unwrap_or(u64::MAX),
            "claimed overdue connection"
        );
        Some(entry)
    }

    /// Return a connection to the pool.
    pub(crate) fn release(&self, entry: &Entry<F>) {
        let mut state = self.state.lock();
        let id = entry.id();

        let was_active = state.remove_active(entry);
        if !was_active || !entry.is_valid(&state.config) {
            tracing::debug!(
                connection_id = %id,
                "a bad connection attempted to return to the pool, discarding connection"
            );
            state.counters.bad_connection_count += 1;
            if was_active {
                state.discard(entry);
                self.available.notify_all();
            }
            return;
        }

        state.counters.accumulated_checkout_time += entry.checkout_time();

        if state.has_idle_capacity() && entry.type_code() == state.expected_type_code {
            match entry.with_real(lifecycle::rollback_unless_auto_commit) {
                Ok(()) => {
                    let fresh = Arc::new(entry.rewrap(Instant::now()));
                    entry.invalidate();
                    state.idle.push_back(fresh);
                    tracing::debug!(connection_id = %id, "returned connection to pool");
                }
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "rollback failed on return, closing connection");
                    state.discard(entry);
                }
            }
        } else {
            state.discard(entry);
            tracing::debug!(connection_id = %id, "closed connection");
        }

        self.available.notify_all();
    }

    fn force_close_all(&self, state: &mut PoolState<F::Connection>) {
        let closed = state.active.len() + state.idle.len();
        state.close_all();
        self.available.notify_all();
        tracing::info!(closed, "forcefully closed/removed all connections");
    }
}

impl<F: ConnectionFactory> Drop for PoolInner<F> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.active.is_empty() || !state.idle.is_empty() {
            state.close_all();
            tracing::debug!("closed remaining connections of dropped pool");
        }
    }
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Pool")
            .field("data_source", &state.data_source)
            .field("config", &state.config)
            .field("status", &state.status())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder(factory)
///     .url("mysql://localhost/app")
///     .username("app")
///     .password("secret")
///     .max_active_connections(20)
///     .build()?;
/// ```
pub struct PoolBuilder<F: ConnectionFactory> {
    factory: F,
    data_source: DataSourceConfig,
    pool_config: PoolConfig,
}

impl<F: ConnectionFactory> PoolBuilder<F> {
    /// Create a new pool builder with default settings.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            data_source: DataSourceConfig::default(),
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the data source configuration.
    #[must_use]
    pub fn data_source(mut self, data_source: DataSourceConfig) -> Self {
        self.data_source = data_source;
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the driver identity.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.data_source = self.data_source.driver(driver);
        self
    }

    /// Set the connection URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.data_source = self.data_source.url(url);
        self
    }

    /// Set the login name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.data_source = self.data_source.username(username);
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.data_source = self.data_source.password(password);
        self
    }

    /// Set the maximum number of active connections.
    #[must_use]
    pub fn max_active_connections(mut self, count: u32) -> Self {
        self.pool_config.max_active_connections = count;
        self
    }

    /// Set the maximum number of idle connections.
    #[must_use]
    pub fn max_idle_connections(mut self, count: u32) -> Self {
        self.pool_config.max_idle_connections = count;
        self
    }

    /// Set the maximum checkout time.
    #[must_use]
    pub fn max_checkout_time(mut self, time: Duration) -> Self {
        self.pool_config.max_checkout_time = time;
        self
    }

    /// Set the time to wait per acquisition attempt.
    #[must_use]
    pub fn time_to_wait(mut self, time: Duration) -> Self {
        self.pool_config.time_to_wait = time;
        self
    }

    /// Set the per-acquisition bad connection tolerance.
    #[must_use]
    pub fn max_local_bad_connection_tolerance(mut self, count: u32) -> Self {
        self.pool_config.max_local_bad_connection_tolerance = count;
        self
    }

    /// Enable or disable the ping query.
    #[must_use]
    pub fn ping_enabled(mut self, enabled: bool) -> Self {
        self.pool_config.ping_enabled = enabled;
        self
    }

    /// Set the ping query.
    #[must_use]
    pub fn ping_query(mut self, query: impl Into<String>) -> Self {
        self.pool_config.ping_query = query.into();
        self
    }

    /// Set the idle time after which connections are pinged.
    #[must_use]
    pub fn ping_connections_not_used_for(mut self, time: Duration) -> Self {
        self.pool_config.ping_connections_not_used_for = time;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool<F>, PoolError> {
        Pool::new(self.factory, self.data_source, self.pool_config)
    }
}
