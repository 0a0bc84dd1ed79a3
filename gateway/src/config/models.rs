use garde::Validate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub cache: CacheConfig,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tuning for the authorization decision cache.
///
/// All durations are in milliseconds. The configuration is immutable once a
/// cache has been built from it.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, PartialEq, Eq)]
pub struct CacheConfig {
    /// Watchdog tick period. Zero ticks as fast as the runtime allows.
    #[garde(skip)]
    #[serde(default = "default_run_interval_millis")]
    pub run_interval_millis: u64,

    /// Minimum time an inactive entry survives before it is purged.
    #[garde(skip)]
    #[serde(default = "default_residence_time_millis")]
    pub residence_time_millis: u64,

    /// Minimum spacing between background refreshes of the same key.
    #[garde(skip)]
    #[serde(default = "default_min_query_interval_millis")]
    pub min_query_interval_millis: u64,

    /// Cap on concurrent background refresh queries.
    #[garde(range(min = 1))]
    #[serde(default = "default_max_pending_queries")]
    pub max_pending_queries: usize,

    /// How far ahead of expiry a finite entry becomes due for refresh.
    #[garde(skip)]
    #[serde(default = "default_query_before_expiry_millis")]
    pub query_before_expiry_millis: u64,

    /// Upper bound on a single backend query, foreground or background.
    #[garde(range(min = 1))]
    #[serde(default = "default_query_timeout_millis")]
    pub query_timeout_millis: u64,
}

fn default_run_interval_millis() -> u64 {
    1_000
}

fn default_residence_time_millis() -> u64 {
    300_000
}

fn default_min_query_interval_millis() -> u64 {
    30_000
}

fn default_max_pending_queries() -> usize {
    100
}

fn default_query_before_expiry_millis() -> u64 {
    60_000
}

fn default_query_timeout_millis() -> u64 {
    30_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            run_interval_millis: default_run_interval_millis(),
            residence_time_millis: default_residence_time_millis(),
            min_query_interval_millis: default_min_query_interval_millis(),
            max_pending_queries: default_max_pending_queries(),
            query_before_expiry_millis: default_query_before_expiry_millis(),
            query_timeout_millis: default_query_timeout_millis(),
        }
    }
}

impl CacheConfig {
    pub fn with_run_interval_millis(mut self, millis: u64) -> Self {
        self.run_interval_millis = millis;
        self
    }

    pub fn with_residence_time_millis(mut self, millis: u64) -> Self {
        self.residence_time_millis = millis;
        self
    }

    pub fn with_min_query_interval_millis(mut self, millis: u64) -> Self {
        self.min_query_interval_millis = millis;
        self
    }

    pub fn with_max_pending_queries(mut self, max: usize) -> Self {
        self.max_pending_queries = max;
        self
    }

    pub fn with_query_before_expiry_millis(mut self, millis: u64) -> Self {
        self.query_before_expiry_millis = millis;
        self
    }

    pub fn with_query_timeout_millis(mut self, millis: u64) -> Self {
        self.query_timeout_millis = millis;
        self
    }

    /// Tick period, floored at one millisecond.
    pub fn run_interval(&self) -> Duration {
        Duration::from_millis(self.run_interval_millis.max(1))
    }

    pub fn residence_time(&self) -> Duration {
        Duration::from_millis(self.residence_time_millis)
    }

    pub fn min_query_interval(&self) -> Duration {
        Duration::from_millis(self.min_query_interval_millis)
    }

    pub fn query_before_expiry(&self) -> Duration {
        Duration::from_millis(self.query_before_expiry_millis)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_millis)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, PartialEq, Eq)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
