//! # sqlpool-testing
//!
//! Test infrastructure for the connection pool.
//!
//! [`MockFactory`] opens in-memory [`MockConnection`]s and keeps a
//! [`MockHandle`] to every connection it ever opened, so tests can check
//! afterwards which connections were closed, rolled back or pinged, and
//! can break connections behind the pool's back.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlpool::Pool;
//! use sqlpool_testing::MockFactory;
//!
//! let factory = MockFactory::new();
//! let pool = Pool::builder(factory.clone()).build()?;
//!
//! drop(pool.get()?);
//! pool.force_close_all();
//! assert!(factory.all_closed());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sqlpool::{Connection, ConnectionFactory, DataSourceConfig, IsolationLevel};
use thiserror::Error;

/// Errors raised by mock connections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockError {
    /// The factory was told to refuse connections.
    #[error("connection refused")]
    ConnectRefused,

    /// Operation on a closed connection.
    #[error("connection is closed")]
    Closed,

    /// The connection was killed and every statement fails.
    #[error("statement failed: {0}")]
    QueryFailed(String),

    /// Rollback was told to fail.
    #[error("rollback failed")]
    RollbackFailed,

    /// Close was told to fail.
    #[error("close failed")]
    CloseFailed,
}

/// Observable state of one mock connection.
#[derive(Debug, Clone)]
pub struct MockState {
    /// Position of this connection in the factory's open order.
    pub index: usize,
    /// Settings the connection was opened with.
    pub data_source: DataSourceConfig,
    /// Whether the connection is open.
    pub open: bool,
    /// Current autocommit mode.
    pub auto_commit: bool,
    /// Current isolation level.
    pub isolation: IsolationLevel,
    /// Whether statements fail (simulates a dead server session).
    pub broken: bool,
    /// Whether rollback fails.
    pub fail_rollback: bool,
    /// Whether close fails. The connection is still marked closed.
    pub fail_close: bool,
    /// Statements executed, in order.
    pub executed: Vec<String>,
    /// Number of rollbacks.
    pub rollbacks: u32,
    /// Number of commits.
    pub commits: u32,
    /// Number of close calls.
    pub close_calls: u32,
}

/// Test handle to a mock connection owned by the pool.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> MockState {
        self.state.lock().clone()
    }

    /// Whether the real connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Number of times `close` was called.
    #[must_use]
    pub fn close_calls(&self) -> u32 {
        self.state.lock().close_calls
    }

    /// Number of rollbacks.
    #[must_use]
    pub fn rollbacks(&self) -> u32 {
        self.state.lock().rollbacks
    }

    /// Statements executed on the connection.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Make every statement fail while the connection still reports itself
    /// open.
    pub fn kill(&self) {
        self.state.lock().broken = true;
    }

    /// Close the connection behind the pool's back.
    pub fn sever(&self) {
        self.state.lock().open = false;
    }

    /// Make rollback fail.
    pub fn fail_rollback(&self, fail: bool) {
        self.state.lock().fail_rollback = fail;
    }

    /// Make close fail.
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }
}

/// An in-memory connection.
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    /// Handle to this connection's state.
    #[must_use]
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Position of this connection in the factory's open order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.state.lock().index
    }
}

impl Connection for MockConnection {
    type Error = MockError;

    fn is_closed(&self) -> Result<bool, MockError> {
        Ok(!self.state.lock().open)
    }

    fn close(&mut self) -> Result<(), MockError> {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.open = false;
        if state.fail_close {
            return Err(MockError::CloseFailed);
        }
        Ok(())
    }

    fn auto_commit(&self) -> Result<bool, MockError> {
        let state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        Ok(state.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), MockError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        state.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MockError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), MockError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        if state.fail_rollback {
            return Err(MockError::RollbackFailed);
        }
        state.rollbacks += 1;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<u64, MockError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        state.executed.push(sql.to_string());
        if state.broken {
            return Err(MockError::QueryFailed(sql.to_string()));
        }
        Ok(0)
    }

    fn transaction_isolation(&self) -> Result<IsolationLevel, MockError> {
        let state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        Ok(state.isolation)
    }

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), MockError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(MockError::Closed);
        }
        state.isolation = level;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    opened: Vec<MockHandle>,
    refuse_connections: bool,
    open_broken: bool,
    auto_commit: bool,
}

/// Connection factory that records every connection it opens.
///
/// Clones share the same record, so a test can keep one clone while the
/// pool owns another.
#[derive(Debug, Clone)]
pub struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFactory {
    /// Create a factory opening healthy, autocommitting connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FactoryState {
                auto_commit: true,
                ..FactoryState::default()
            })),
        }
    }

    /// Open connections in manual-commit mode.
    #[must_use]
    pub fn manual_commit(self) -> Self {
        self.state.lock().auto_commit = false;
        self
    }

    /// Refuse (or accept again) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Open new connections already broken: they report themselves open,
    /// but every statement fails.
    pub fn open_broken(&self, broken: bool) {
        self.state.lock().open_broken = broken;
    }

    /// Number of connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.lock().opened.len()
    }

    /// Number of opened connections that are still open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state
            .lock()
            .opened
            .iter()
            .filter(|h| h.is_open())
            .count()
    }

    /// Whether every connection ever opened has been closed.
    #[must_use]
    pub fn all_closed(&self) -> bool {
        self.open_count() == 0
    }

    /// Handle to the `index`-th opened connection.
    #[must_use]
    pub fn connection(&self, index: usize) -> Option<MockHandle> {
        self.state.lock().opened.get(index).cloned()
    }

    /// Handles to every opened connection.
    #[must_use]
    pub fn connections(&self) -> Vec<MockHandle> {
        self.state.lock().opened.clone()
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;
    type Error = MockError;

    fn connect(&self, config: &DataSourceConfig) -> Result<MockConnection, MockError> {
        let mut factory = self.state.lock();
        if factory.refuse_connections {
            tracing::debug!(url = ?config.url, "mock factory refusing connection");
            return Err(MockError::ConnectRefused);
        }

        let state = Arc::new(Mutex::new(MockState {
            index: factory.opened.len(),
            data_source: config.clone(),
            open: true,
            auto_commit: factory.auto_commit,
            isolation: IsolationLevel::default(),
            broken: factory.open_broken,
            fail_rollback: false,
            fail_close: false,
            executed: Vec::new(),
            rollbacks: 0,
            commits: 0,
            close_calls: 0,
        }));
        factory.opened.push(MockHandle {
            state: Arc::clone(&state),
        });

        Ok(MockConnection { state })
    }
}
