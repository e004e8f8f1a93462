//! Pool and data source configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use crate::connection::IsolationLevel;
use crate::error::PoolError;

/// Prefix marking a property that is passed through to the driver.
pub const DRIVER_PROPERTY_PREFIX: &str = "driver.";

/// Ping query used when none has been configured.
pub const DEFAULT_PING_QUERY: &str = "NO PING QUERY SET";

/// Settings used to open real connections.
///
/// The URL, username and password together define the connection "type":
/// connections opened under one set of values are not reused after any of
/// them change.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DataSourceConfig {
    /// Driver identity, interpreted by the connection factory.
    pub driver: Option<String>,

    /// Connection URL.
    pub url: Option<String>,

    /// Login name.
    pub username: Option<String>,

    /// Login password.
    pub password: Option<String>,

    /// Autocommit mode applied to newly opened connections.
    pub auto_commit: Option<bool>,

    /// Isolation level applied to newly opened connections.
    pub default_transaction_isolation: Option<IsolationLevel>,

    /// Arbitrary properties handed to the driver.
    pub driver_properties: BTreeMap<String, String>,
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auto_commit", &self.auto_commit)
            .field(
                "default_transaction_isolation",
                &self.default_transaction_isolation,
            )
            .field("driver_properties", &self.driver_properties)
            .finish()
    }
}

impl DataSourceConfig {
    /// Create a configuration with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse data source settings from a `key=value;key=value` string.
    ///
    /// Pool options in the same string are ignored here; see
    /// [`PoolConfig::from_properties`].
    pub fn from_properties(props: &str) -> Result<Self, PoolError> {
        let mut config = Self::default();
        for (key, value) in split_properties(props)? {
            config.apply_property(&key, value)?;
        }
        Ok(config)
    }

    /// Apply a single property. Returns `false` if the key is not a data
    /// source property.
    fn apply_property(&mut self, key: &str, value: &str) -> Result<bool, PoolError> {
        if let Some(name) = strip_prefix_ignore_case(key, DRIVER_PROPERTY_PREFIX) {
            self.driver_properties
                .insert(name.to_string(), value.to_string());
            return Ok(true);
        }

        match key.to_ascii_lowercase().as_str() {
            "driver" => self.driver = Some(value.to_string()),
            "url" => self.url = Some(value.to_string()),
            "username" | "user" => self.username = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "autocommit" | "defaultautocommit" => {
                self.auto_commit = Some(parse_bool(key, value)?);
            }
            "defaulttransactionisolationlevel" => {
                self.default_transaction_isolation = Some(value.parse()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Set the driver identity.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the connection URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the login name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the autocommit mode for new connections.
    #[must_use]
    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = Some(auto_commit);
        self
    }

    /// Set the isolation level for new connections.
    #[must_use]
    pub fn default_transaction_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_transaction_isolation = Some(level);
        self
    }

    /// Add a driver property.
    #[must_use]
    pub fn driver_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.driver_properties.insert(key.into(), value.into());
        self
    }

    /// Fingerprint of the URL and credentials.
    ///
    /// Pooled connections carry the code that was current when they were
    /// checked out; a mismatch on return means the configuration changed and
    /// the connection must not be pooled again.
    #[must_use]
    pub fn type_code(&self) -> u64 {
        connection_type_code(
            self.url.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        )
    }
}

/// Compute the connection type code for a URL and credentials.
#[must_use]
pub fn connection_type_code(
    url: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    username.hash(&mut hasher);
    password.hash(&mut hasher);
    hasher.finish()
}

/// Configuration for the connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of connections checked out at once.
    pub max_active_connections: u32,

    /// Maximum number of idle connections kept for reuse.
    pub max_idle_connections: u32,

    /// How long a connection may stay checked out before another caller
    /// may reclaim it.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub max_checkout_time: Duration,

    /// How long one acquisition attempt waits before re-checking the pool.
    /// Zero waits until a connection is released, without a timeout.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub time_to_wait: Duration,

    /// Bad connections tolerated per acquisition, on top of
    /// `max_idle_connections`.
    pub max_local_bad_connection_tolerance: u32,

    /// Whether to run the ping query before handing out connections.
    pub ping_enabled: bool,

    /// Query used to test that a connection is alive.
    pub ping_query: String,

    /// Only ping connections that have been unused for at least this long.
    #[cfg_attr(feature = "serde", serde(with = "duration_ms"))]
    pub ping_connections_not_used_for: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active_connections: 10,
            max_idle_connections: 5,
            max_checkout_time: Duration::from_secs(20),
            time_to_wait: Duration::from_secs(20),
            max_local_bad_connection_tolerance: 3,
            ping_enabled: false,
            ping_query: DEFAULT_PING_QUERY.to_string(),
            ping_connections_not_used_for: Duration::ZERO,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse pool options from a `key=value;key=value` string.
    ///
    /// Durations are given in milliseconds. Data source keys and unknown
    /// keys are ignored.
    pub fn from_properties(props: &str) -> Result<Self, PoolError> {
        let mut config = Self::default();
        for (key, value) in split_properties(props)? {
            if !config.apply_property(&key, value)? {
                tracing::debug!(key = %key, "ignoring non-pool property");
            }
        }
        Ok(config)
    }

    fn apply_property(&mut self, key: &str, value: &str) -> Result<bool, PoolError> {
        match key.to_ascii_lowercase().as_str() {
            "poolmaximumactiveconnections" => {
                self.max_active_connections = parse_number(key, value)?;
            }
            "poolmaximumidleconnections" => {
                self.max_idle_connections = parse_number(key, value)?;
            }
            "poolmaximumcheckouttime" => {
                self.max_checkout_time = Duration::from_millis(parse_number(key, value)?);
            }
            "pooltimetowait" => {
                self.time_to_wait = Duration::from_millis(parse_number(key, value)?);
            }
            "poolmaximumlocalbadconnectiontolerance" => {
                self.max_local_bad_connection_tolerance = parse_number(key, value)?;
            }
            "poolpingenabled" => self.ping_enabled = parse_bool(key, value)?,
            "poolpingquery" => self.ping_query = value.to_string(),
            "poolpingconnectionsnotusedfor" => {
                self.ping_connections_not_used_for =
                    Duration::from_millis(parse_number(key, value)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_active_connections == 0 {
            return Err(PoolError::Config(
                "max_active_connections must be greater than zero".into(),
            ));
        }
        if self.ping_enabled && self.ping_query.trim().is_empty() {
            return Err(PoolError::Config(
                "ping_query must not be empty when pinging is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound of bad connections a single acquisition may encounter.
    #[must_use]
    pub fn bad_connection_limit(&self) -> u32 {
        self.max_idle_connections
            .saturating_add(self.max_local_bad_connection_tolerance)
    }

    /// Set the maximum number of active connections.
    #[must_use]
    pub fn max_active_connections(mut self, count: u32) -> Self {
        self.max_active_connections = count;
        self
    }

    /// Set the maximum number of idle connections.
    #[must_use]
    pub fn max_idle_connections(mut self, count: u32) -> Self {
        self.max_idle_connections = count;
        self
    }

    /// Set the maximum checkout time.
    #[must_use]
    pub fn max_checkout_time(mut self, time: Duration) -> Self {
        self.max_checkout_time = time;
        self
    }

    /// Set the time to wait per acquisition attempt.
    #[must_use]
    pub fn time_to_wait(mut self, time: Duration) -> Self {
        self.time_to_wait = time;
        self
    }

    /// Set the per-acquisition bad connection tolerance.
    #[must_use]
    pub fn max_local_bad_connection_tolerance(mut self, count: u32) -> Self {
        self.max_local_bad_connection_tolerance = count;
        self
    }

    /// Enable or disable the ping query.
    #[must_use]
    pub fn ping_enabled(mut self, enabled: bool) -> Self {
        self.ping_enabled = enabled;
        self
    }

    /// Set the ping query.
    #[must_use]
    pub fn ping_query(mut self, query: impl Into<String>) -> Self {
        self.ping_query = query.into();
        self
    }

    /// Set the idle time after which connections are pinged.
    #[must_use]
    pub fn ping_connections_not_used_for(mut self, time: Duration) -> Self {
        self.ping_connections_not_used_for = time;
        self
    }
}

/// Parse both data source and pool settings from one property string.
pub fn parse_properties(props: &str) -> Result<(DataSourceConfig, PoolConfig), PoolError> {
    let mut data_source = DataSourceConfig::default();
    let mut pool = PoolConfig::default();

    for (key, value) in split_properties(props)? {
        if data_source.apply_property(&key, value)? || pool.apply_property(&key, value)? {
            continue;
        }
        // Ignore unknown options for forward compatibility
        tracing::debug!(key = %key, "ignoring unknown pool property");
    }

    Ok((data_source, pool))
}

fn split_properties(props: &str) -> Result<Vec<(String, &str)>, PoolError> {
    let mut pairs = Vec::new();
    for part in props.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| PoolError::Config(format!("invalid key-value: {part}")))?;
        pairs.push((key.trim().to_string(), value.trim()));
    }
    Ok(pairs)
}

fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let head = key.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        key.get(prefix.len()..).filter(|rest| !rest.is_empty())
    } else {
        None
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PoolError> {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") || value == "1" {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("no") || value == "0"
    {
        Ok(false)
    } else {
        Err(PoolError::Config(format!("invalid boolean for {key}: {value}")))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PoolError> {
    value
        .parse()
        .map_err(|_| PoolError::Config(format!("invalid number for {key}: {value}")))
}

#[cfg(feature = "serde")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
