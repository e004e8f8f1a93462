//! Shared pool bookkeeping.
//!
//! [`PoolState`] is owned by the pool's single mutex. Every read and
//! mutation of the idle and active sets, the counters and the current
//! configuration happens while that mutex is held.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DataSourceConfig, PoolConfig};
use crate::connection::Connection;
use crate::lifecycle;
use crate::pooled::PoolEntry;

/// Mutable state guarded by the pool lock.
pub(crate) struct PoolState<C> {
    /// Connections available for checkout, reused oldest-returned first.
    pub(crate) idle: VecDeque<Arc<PoolEntry<C>>>,
    /// Connections currently checked out, in checkout order.
    pub(crate) active: Vec<Arc<PoolEntry<C>>>,
    pub(crate) data_source: DataSourceConfig,
    pub(crate) config: PoolConfig,
    pub(crate) expected_type_code: u64,
    pub(crate) closed: bool,
    pub(crate) counters: Counters,
}

/// Running totals. Never decrease.
#[derive(Debug, Default, Clone)]
pub(crate) struct Counters {
    pub(crate) request_count: u64,
    pub(crate) accumulated_request_time: Duration,
    pub(crate) had_to_wait_count: u64,
    pub(crate) accumulated_wait_time: Duration,
    pub(crate) accumulated_checkout_time: Duration,
    pub(crate) claimed_overdue_connection_count: u64,
    pub(crate) accumulated_checkout_time_of_overdue_connections: Duration,
    pub(crate) bad_connection_count: u64,
    pub(crate) connections_created: u64,
    pub(crate) connections_closed: u64,
}

impl<C> PoolState<C> {
    pub(crate) fn new(data_source: DataSourceConfig, config: PoolConfig) -> Self {
        let expected_type_code = data_source.type_code();
        Self {
            idle: VecDeque::new(),
            active: Vec::new(),
            data_source,
            config,
            expected_type_code,
            closed: false,
            counters: Counters::default(),
        }
    }

    /// Remove a wrapper from the active set by identity.
    ///
    /// Returns `false` if this exact wrapper is not active, e.g. because it
    /// was already reclaimed and replaced by a newer wrapper around the same
    /// real connection.
    pub(crate) fn remove_active(&mut self, entry: &Arc<PoolEntry<C>>) -> bool {
        match self.active.iter().position(|e| Arc::ptr_eq(e, entry)) {
            Some(index) => {
                self.active.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_idle_capacity(&self) -> bool {
        self.idle.len() < self.config.max_idle_connections as usize
    }

    pub(crate) fn has_active_capacity(&self) -> bool {
        self.active.len() < self.config.max_active_connections as usize
    }

    pub(crate) fn status(&self) -> PoolStatus {
        PoolStatus {
            idle: count(self.idle.len()),
            active: count(self.active.len()),
            max_active: self.config.max_active_connections,
            max_idle: self.config.max_idle_connections,
        }
    }

    pub(crate) fn metrics(&self) -> PoolMetrics {
        let c = &self.counters;
        PoolMetrics {
            request_count: c.request_count,
            average_request_time: average(c.accumulated_request_time, c.request_count),
            had_to_wait_count: c.had_to_wait_count,
            average_wait_time: average(c.accumulated_wait_time, c.had_to_wait_count),
            average_checkout_time: average(c.accumulated_checkout_time, c.request_count),
            claimed_overdue_connection_count: c.claimed_overdue_connection_count,
            average_overdue_checkout_time: average(
                c.accumulated_checkout_time_of_overdue_connections,
                c.claimed_overdue_connection_count,
            ),
            bad_connection_count: c.bad_connection_count,
            connections_created: c.connections_created,
            connections_closed: c.connections_closed,
            idle_connections: count(self.idle.len()),
            active_connections: count(self.active.len()),
        }
    }
}

impl<C: Connection> PoolState<C> {
    /// Invalidate a wrapper and close its real connection, best effort.
    pub(crate) fn discard(&mut self, entry: &PoolEntry<C>) {
        entry.invalidate();
        let id = entry.id();
        entry.with_real(|real| lifecycle::discard(real, id));
        self.counters.connections_closed += 1;
    }

    /// Invalidate and close every active and idle connection, and recompute
    /// the expected connection type code from the current configuration.
    ///
    /// Cleanup failures are logged and never stop the sweep.
    pub(crate) fn close_all(&mut self) {
        self.expected_type_code = self.data_source.type_code();

        let active = std::mem::take(&mut self.active);
        let idle = std::mem::take(&mut self.idle);
        for entry in active.iter().rev().chain(idle.iter().rev()) {
            self.discard(entry);
        }
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: u32,
    /// Number of connections currently checked out.
    pub active: u32,
    /// Maximum allowed active connections.
    pub max_active: u32,
    /// Maximum idle connections kept.
    pub max_idle: u32,
}

impl PoolStatus {
    /// Total number of open connections owned by the pool.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.idle + self.active
    }

    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_active == 0 {
            return 0.0;
        }
        (self.active as f64 / self.max_active as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.active >= self.max_active
    }
}

/// Snapshot of the pool's running statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Successful acquisitions.
    pub request_count: u64,
    /// Average time from the start of an acquisition to its success.
    pub average_request_time: Duration,
    /// Acquisitions that had to wait for a connection.
    pub had_to_wait_count: u64,
    /// Average wait time of acquisitions that had to wait.
    pub average_wait_time: Duration,
    /// Average time connections were checked out.
    pub average_checkout_time: Duration,
    /// Overdue connections reclaimed from their holders.
    pub claimed_overdue_connection_count: u64,
    /// Average checkout time of reclaimed overdue connections.
    pub average_overdue_checkout_time: Duration,
    /// Connections found invalid at checkout or return.
    pub bad_connection_count: u64,
    /// Real connections opened.
    pub connections_created: u64,
    /// Real connections closed by the pool.
    pub connections_closed: u64,
    /// Idle connections at snapshot time.
    pub idle_connections: u32,
    /// Active connections at snapshot time.
    pub active_connections: u32,
}

impl fmt::Display for PoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===CONFIGURATION==============================================")?;
        writeln!(f, " activeConnections          {}", self.active_connections)?;
        writeln!(f, " idleConnections            {}", self.idle_connections)?;
        writeln!(f, "===POOL STATISTICS============================================")?;
        writeln!(f, " requestCount               {}", self.request_count)?;
        writeln!(f, " averageRequestTime         {:?}", self.average_request_time)?;
        writeln!(f, " averageCheckoutTime        {:?}", self.average_checkout_time)?;
        writeln!(f, " claimedOverdue             {}", self.claimed_overdue_connection_count)?;
        writeln!(f, " averageOverdueCheckoutTime {:?}", self.average_overdue_checkout_time)?;
        writeln!(f, " hadToWait                  {}", self.had_to_wait_count)?;
        writeln!(f, " averageWaitTime            {:?}", self.average_wait_time)?;
        writeln!(f, " badConnectionCount         {}", self.bad_connection_count)?;
        writeln!(f, " connectionsCreated         {}", self.connections_created)?;
        write!(f, " connectionsClosed          {}", self.connections_closed)
    }
}
