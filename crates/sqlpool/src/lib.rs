//! # sqlpool
//!
//! A simple, synchronous, thread-safe pool of database connections.
//!
//! The pool is driver-agnostic: real connections are opened by a
//! [`ConnectionFactory`] and managed through the small [`Connection`] trait.
//! Callers block (with a bounded wait per attempt) until a connection is
//! available.
//!
//! ## Features
//!
//! - Bounded active and idle sets with FIFO reuse of idle connections
//! - Liveness checks via a configurable ping query
//! - Reclamation of connections held longer than the maximum checkout time
//! - Per-call tolerance for bad connections
//! - Automatic invalidation of pooled connections when the URL, credentials
//!   or pool limits change
//! - Pool status and running statistics
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlpool::{Connection, Pool, PoolConfig};
//! use std::time::Duration;
//!
//! let pool = Pool::builder(my_driver::connect)
//!     .url("postgres://localhost/app")
//!     .username("app")
//!     .password("secret")
//!     .max_active_connections(20)
//!     .max_checkout_time(Duration::from_secs(30))
//!     .ping_enabled(true)
//!     .ping_query("SELECT 1")
//!     .build()?;
//!
//! // Get a connection from the pool
//! let mut conn = pool.get()?;
//! conn.execute("DELETE FROM sessions WHERE expired")?;
//! // Closing (or dropping) returns the connection to the pool
//! conn.close()?;
//!
//! // Check pool status
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//!
//! // Get metrics
//! println!("{}", pool.metrics());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod pooled;
pub mod state;

// Configuration
pub use config::{DataSourceConfig, PoolConfig, parse_properties};

// Connection capabilities
pub use connection::{Connection, ConnectionFactory, IsolationLevel};

// Error types
pub use error::{BoxError, PoolError};

// Pool types
pub use pool::{Pool, PoolBuilder};
pub use pooled::PooledConnection;
pub use state::{PoolMetrics, PoolStatus};

// Lifecycle management
pub use lifecycle::{ConnectionId, ConnectionMetadata, HealthCheckResult};
