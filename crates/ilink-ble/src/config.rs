//! Session configuration

use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a light session
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transport connect attempts per `connect()` call
    pub connect_retries: u32,
    /// Pause between failed connect attempts
    pub retry_delay: Duration,
    /// Maximum time a single transport connect may take
    pub connect_timeout: Duration,
    /// Maximum time a command write may take
    pub write_timeout: Duration,
    /// Consecutive write failures tolerated before one aggregated report
    pub write_error_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_retries: 3,
            retry_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(1),
            write_error_threshold: 10,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connect attempts per call
    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = retries.max(1);
        self
    }

    /// Set the pause between failed connect attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the aggregated write failure threshold
    pub fn with_write_error_threshold(mut self, threshold: u32) -> Self {
        self.write_error_threshold = threshold;
        self
    }
}
