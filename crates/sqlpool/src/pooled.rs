//! Pooled connection wrappers.
//!
//! Every time the pool hands a real connection to a new owner (a fresh
//! checkout after a return, or an overdue reclaim) it builds a brand-new
//! [`PoolEntry`] around the same real connection and invalidates the old
//! one. A caller still holding the old [`PooledConnection`] therefore gets
//! [`PoolError::IllegalState`] instead of touching a connection that now
//! belongs to someone else.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::connection::{Connection, ConnectionFactory, IsolationLevel};
use crate::error::PoolError;
use crate::lifecycle::{self, ConnectionId, ConnectionMetadata, HealthCheckResult};
use crate::pool::PoolInner;

/// One wrapper around a real connection, as tracked by the pool.
pub(crate) struct PoolEntry<C> {
    real: Arc<Mutex<C>>,
    meta: Mutex<ConnectionMetadata>,
    valid: AtomicBool,
}

impl<C: Connection> PoolEntry<C> {
    pub(crate) fn new(conn: C, id: ConnectionId) -> Self {
        Self {
            real: Arc::new(Mutex::new(conn)),
            meta: Mutex::new(ConnectionMetadata::new(id, Instant::now())),
            valid: AtomicBool::new(true),
        }
    }

    /// Build a fresh wrapper around the same real connection.
    ///
    /// The creation time and identity carry over. The caller is responsible
    /// for invalidating `self`.
    pub(crate) fn rewrap(&self, last_used_at: Instant) -> Self {
        let old = *self.meta.lock();
        let meta = ConnectionMetadata {
            last_used_at,
            ..ConnectionMetadata::new(old.id, old.created_at)
        };
        Self {
            real: Arc::clone(&self.real),
            meta: Mutex::new(meta),
            valid: AtomicBool::new(true),
        }
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Whether the wrapper has not been invalidated. Does not touch the real
    /// connection.
    pub(crate) fn is_marked_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.meta.lock().id
    }

    pub(crate) fn metadata(&self) -> ConnectionMetadata {
        *self.meta.lock()
    }

    pub(crate) fn checkout_time(&self) -> Duration {
        self.meta.lock().checkout_time()
    }

    pub(crate) fn type_code(&self) -> u64 {
        self.meta.lock().type_code
    }

    /// Record a checkout.
    pub(crate) fn stamp_checkout(&self, type_code: u64, now: Instant) {
        let mut meta = self.meta.lock();
        meta.type_code = type_code;
        meta.checkout_at = now;
        meta.last_used_at = now;
    }

    /// Full validity check: the wrapper flag plus a liveness check of the
    /// real connection.
    pub(crate) fn is_valid(&self, config: &PoolConfig) -> bool {
        if !self.is_marked_valid() {
            return false;
        }
        let meta = self.metadata();
        let mut real = self.real.lock();
        let result = lifecycle::check_health(&mut *real, meta.id, meta.idle_time(), config);
        if let HealthCheckResult::PingFailed(reason) = &result {
            tracing::debug!(connection_id = %meta.id, reason = %reason, "connection is BAD");
        }
        result.is_healthy()
    }

    /// Run `f` against the real connection.
    pub(crate) fn with_real<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut *self.real.lock())
    }
}

impl<C> fmt::Debug for PoolEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("meta", &*self.meta.lock())
            .field("valid", &self.valid.load(Ordering::Relaxed))
            .finish()
    }
}

/// A connection checked out of the pool.
///
/// `PooledConnection` implements [`Connection`] itself: every operation is
/// forwarded to the real connection, except [`Connection::close`], which
/// returns the connection to the pool instead of closing it. Dropping the
/// handle has the same effect as closing it.
///
/// Once the pool invalidates the handle (after it was returned, reclaimed as
/// overdue, or closed by [`Pool::force_close_all`](crate::Pool::force_close_all)),
/// every forwarded operation fails with [`PoolError::IllegalState`] and
/// [`Connection::is_closed`] reports `true`.
///
/// Two handles are equal when they wrap the same real connection.
pub struct PooledConnection<F: ConnectionFactory> {
    entry: Arc<PoolEntry<F::Connection>>,
    pool: Arc<PoolInner<F>>,
    released: bool,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub(crate) fn new(entry: Arc<PoolEntry<F::Connection>>, pool: Arc<PoolInner<F>>) -> Self {
        Self {
            entry,
            pool,
            released: false,
        }
    }

    /// Identity of the underlying real connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.entry.id()
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> ConnectionMetadata {
        self.entry.metadata()
    }

    /// Whether this handle is still the pool's current wrapper for its real
    /// connection.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.entry.is_marked_valid()
    }

    /// How long this connection has been checked out.
    #[must_use]
    pub fn checkout_time(&self) -> Duration {
        self.entry.checkout_time()
    }

    /// Run a closure against the real connection.
    ///
    /// Use this for driver-specific operations the [`Connection`] trait does
    /// not cover.
    ///
    /// The closure runs while this connection's lock is held. It must not
    /// call back into the pool (`get`, `status`, dropping another pooled
    /// connection, ...): the pool takes its own lock first and the
    /// connection lock second, so a thread reclaiming this connection as
    /// overdue would hold the pool lock and wait for the connection lock
    /// while the closure waits for the pool lock, and both threads hang.
    pub fn with_raw<R>(
        &self,
        f: impl FnOnce(&mut F::Connection) -> R,
    ) -> Result<R, PoolError> {
        self.entry.with_real(|real| {
            if !self.entry.is_marked_valid() {
                return Err(PoolError::IllegalState);
            }
            Ok(f(real))
        })
    }

    fn forward<R>(
        &self,
        op: impl FnOnce(&mut F::Connection) -> Result<R, <F::Connection as Connection>::Error>,
    ) -> Result<R, PoolError> {
        self.with_raw(op)?.map_err(PoolError::connection)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release(&self.entry);
        }
    }
}

impl<F: ConnectionFactory> Connection for PooledConnection<F> {
    type Error = PoolError;

    fn is_closed(&self) -> Result<bool, PoolError> {
        if !self.entry.is_marked_valid() {
            return Ok(true);
        }
        self.entry
            .with_real(|real| real.is_closed())
            .map_err(PoolError::connection)
    }

    /// Return the connection to the pool. The real connection stays open.
    fn close(&mut self) -> Result<(), PoolError> {
        self.release();
        Ok(())
    }

    fn auto_commit(&self) -> Result<bool, PoolError> {
        self.forward(|real| real.auto_commit())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), PoolError> {
        self.forward(|real| real.set_auto_commit(auto_commit))
    }

    fn commit(&mut self) -> Result<(), PoolError> {
        self.forward(|real| real.commit())
    }

    fn rollback(&mut self) -> Result<(), PoolError> {
        self.forward(|real| real.rollback())
    }

    fn execute(&mut self, sql: &str) -> Result<u64, PoolError> {
        self.forward(|real| real.execute(sql))
    }

    fn transaction_isolation(&self) -> Result<IsolationLevel, PoolError> {
        self.forward(|real| real.transaction_isolation())
    }

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), PoolError> {
        self.forward(|real| real.set_transaction_isolation(level))
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        tracing::trace!(connection_id = %self.entry.id(), "returning connection to pool");
        self.release();
    }
}

impl<F: ConnectionFactory> PartialEq for PooledConnection<F> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<F: ConnectionFactory> Eq for PooledConnection<F> {}

impl<F: ConnectionFactory> Hash for PooledConnection<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<F: ConnectionFactory> fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("entry", &self.entry)
            .field("released", &self.released)
            .finish()
    }
}
