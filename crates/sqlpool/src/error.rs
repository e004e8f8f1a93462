//! Pool error types.

use thiserror::Error;

/// Boxed error raised by a driver or connection factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while acquiring or using pooled connections.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// No valid connection could be obtained before the per-call bad
    /// connection tolerance was exceeded.
    #[error("could not get a good connection to the database after {attempts} bad connections")]
    ExhaustedRetries {
        /// Number of bad connections encountered by the failing call.
        attempts: u32,
    },

    /// The caller was waiting for a connection and the wait was interrupted.
    #[error("interrupted while waiting for a connection")]
    WaitInterrupted,

    /// The acquisition loop finished without a connection and without an
    /// error. This indicates a bug in the pool.
    #[error("unknown severe error condition: {0}")]
    InvalidState(String),

    /// An operation was attempted through a pooled connection that is no
    /// longer valid.
    #[error("pooled connection is invalid: it was returned, reclaimed or closed by the pool")]
    IllegalState,

    /// The pool has been shut down.
    #[error("connection pool is closed")]
    PoolClosed,

    /// The factory failed to open a new real connection.
    #[error("failed to open connection: {0}")]
    Connect(#[source] BoxError),

    /// An operation forwarded to the real connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Wrap a driver error raised by a forwarded connection operation.
    pub fn connection<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connection(err.into())
    }

    /// Check whether the error was caused by using an invalidated pooled
    /// connection.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState)
    }

    /// Check whether retrying the acquisition later might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ExhaustedRetries { .. } | Self::WaitInterrupted | Self::Connect(_)
        )
    }
}
