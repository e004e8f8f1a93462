//! Capability interfaces for real connections and the factory that opens them.
//!
//! The pool never talks to a database itself. It relies on a
//! [`ConnectionFactory`] to open raw connections and on the [`Connection`]
//! trait for the handful of operations it needs to manage them: liveness
//! tests, autocommit and rollback handling, and closing.

use std::fmt;
use std::str::FromStr;

use crate::config::DataSourceConfig;
use crate::error::PoolError;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IsolationLevel {
    /// Transactions are not supported.
    None,
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,
    /// Read committed.
    #[default]
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable (highest isolation).
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL statement to set this isolation level.
    ///
    /// Returns `None` for [`IsolationLevel::None`], which has no SQL form.
    #[must_use]
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ReadUncommitted => Some("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"),
            Self::ReadCommitted => Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED"),
            Self::RepeatableRead => Some("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ"),
            Self::Serializable => Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"),
        }
    }

    /// Map the numeric level codes used by JDBC-style drivers
    /// (0, 1, 2, 4, 8) to an isolation level.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::ReadUncommitted),
            2 => Some(Self::ReadCommitted),
            4 => Some(Self::RepeatableRead),
            8 => Some(Self::Serializable),
            _ => None,
        }
    }

    /// The numeric level code of this isolation level.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::ReadUncommitted => 1,
            Self::ReadCommitted => 2,
            Self::RepeatableRead => 4,
            Self::Serializable => 8,
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

impl FromStr for IsolationLevel {
    type Err = PoolError;

    /// Accepts either a numeric level code or a level name such as
    /// `read_committed` or `READ COMMITTED`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code)
                .ok_or_else(|| PoolError::Config(format!("invalid isolation level code: {code}")));
        }

        let normalized = s.to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "read_uncommitted" => Ok(Self::ReadUncommitted),
            "read_committed" => Ok(Self::ReadCommitted),
            "repeatable_read" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            _ => Err(PoolError::Config(format!("invalid isolation level: {s}"))),
        }
    }
}

/// A real database connection as seen by the pool.
///
/// Implementations wrap a driver connection. Every method may fail with the
/// driver's own error type; the pool decides which failures are surfaced and
/// which are absorbed.
pub trait Connection: Send + 'static {
    /// Driver error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the connection has been closed.
    fn is_closed(&self) -> Result<bool, Self::Error>;

    /// Close the connection.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Current autocommit mode.
    fn auto_commit(&self) -> Result<bool, Self::Error>;

    /// Change the autocommit mode.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), Self::Error>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Run a one-shot text statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64, Self::Error>;

    /// Current transaction isolation level.
    fn transaction_isolation(&self) -> Result<IsolationLevel, Self::Error>;

    /// Change the transaction isolation level.
    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<(), Self::Error>;
}

/// Opens real connections for the pool.
///
/// Any `Fn(&DataSourceConfig) -> Result<C, E>` closure is a factory.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The real connection type produced by this factory.
    type Connection: Connection;
    /// Error raised when a connection cannot be opened.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new real connection using the given data source settings.
    fn connect(&self, config: &DataSourceConfig) -> Result<Self::Connection, Self::Error>;
}

impl<F, C, E> ConnectionFactory for F
where
    F: Fn(&DataSourceConfig) -> Result<C, E> + Send + Sync + 'static,
    C: Connection,
    E: std::error::Error + Send + Sync + 'static,
{
    type Connection = C;
    type Error = E;

    fn connect(&self, config: &DataSourceConfig) -> Result<C, E> {
        self(config)
    }
}
