//! Connection lifecycle: identity, timestamps, liveness checks and
//! best-effort cleanup of real connections.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::{DataSourceConfig, PoolConfig};
use crate::connection::Connection;

/// Process-wide source of connection ids, shared by every pool.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a real connection.
///
/// The id is assigned when a pool opens the connection and is kept across
/// every wrapper the pool creates around it. Ids are never reused, not even
/// across pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping attached to one pooled connection wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMetadata {
    /// Identity of the underlying real connection.
    pub id: ConnectionId,
    /// When the real connection was opened.
    pub created_at: Instant,
    /// When the connection was last handed out or returned.
    pub last_used_at: Instant,
    /// When the connection was last checked out.
    pub checkout_at: Instant,
    /// Connection type code stamped at checkout.
    pub type_code: u64,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: ConnectionId, now: Instant) -> Self {
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_at: now,
            type_code: 0,
        }
    }

    /// Time since the real connection was opened.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last used.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Time since the connection was checked out.
    #[must_use]
    pub fn checkout_time(&self) -> Duration {
        self.checkout_at.elapsed()
    }
}

/// Outcome of a liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckResult {
    /// The connection is usable.
    Healthy,
    /// The real connection reports itself closed, or could not say.
    Closed,
    /// The ping query failed; the real connection has been closed.
    PingFailed(String),
}

impl HealthCheckResult {
    /// Check if the connection passed.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Check that a real connection is still usable.
///
/// The connection must report itself open. When pinging is enabled and the
/// connection has been idle for at least the configured threshold, the ping
/// query is run as well; a failing ping closes the real connection so it is
/// never reused.
pub(crate) fn check_health<C: Connection>(
    conn: &mut C,
    id: ConnectionId,
    idle_time: Duration,
    config: &PoolConfig,
) -> HealthCheckResult {
    match conn.is_closed() {
        Ok(false) => {}
        Ok(true) => return HealthCheckResult::Closed,
        Err(e) => {
            tracing::debug!(connection_id = %id, error = %e, "connection is BAD");
            return HealthCheckResult::Closed;
        }
    }

    if !config.ping_enabled || idle_time < config.ping_connections_not_used_for {
        return HealthCheckResult::Healthy;
    }

    tracing::debug!(connection_id = %id, "testing connection");
    let ping = conn
        .execute(&config.ping_query)
        .and_then(|_| rollback_unless_auto_commit(conn));

    match ping {
        Ok(()) => {
            tracing::debug!(connection_id = %id, "connection is GOOD");
            HealthCheckResult::Healthy
        }
        Err(e) => {
            tracing::warn!(
                connection_id = %id,
                query = %config.ping_query,
                error = %e,
                "execution of ping query failed"
            );
            if let Err(close_err) = conn.close() {
                tracing::debug!(connection_id = %id, error = %close_err, "close after failed ping");
            }
            HealthCheckResult::PingFailed(e.to_string())
        }
    }
}

/// Roll back the current transaction if the connection is not autocommitting.
pub(crate) fn rollback_unless_auto_commit<C: Connection>(conn: &mut C) -> Result<(), C::Error> {
    if !conn.auto_commit()? {
        conn.rollback()?;
    }
    Ok(())
}

/// Apply the data source defaults to a newly opened connection.
pub(crate) fn initialize<C: Connection>(
    conn: &mut C,
    data_source: &DataSourceConfig,
) -> Result<(), C::Error> {
    if let Some(auto_commit) = data_source.auto_commit {
        if conn.auto_commit()? != auto_commit {
            conn.set_auto_commit(auto_commit)?;
        }
    }
    if let Some(level) = data_source.default_transaction_isolation {
        conn.set_transaction_isolation(level)?;
    }
    Ok(())
}

/// Roll back and close a real connection, logging instead of failing.
pub(crate) fn discard<C: Connection>(conn: &mut C, id: ConnectionId) {
    if matches!(conn.is_closed(), Ok(true)) {
        return;
    }
    if let Err(e) = rollback_unless_auto_commit(conn) {
        tracing::debug!(connection_id = %id, error = %e, "rollback failed while discarding connection");
    }
    if let Err(e) = conn.close() {
        tracing::warn!(connection_id = %id, error = %e, "failed to close connection");
    }
}
