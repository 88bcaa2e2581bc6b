//! Coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing of deferred and dependent writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Delay before a write deferred by a busy link is retried
    pub debounce_delay: Duration,
    /// Pause between a color write and the brightness re-assert that follows it
    pub command_gap: Duration,
    /// Consecutive deferrals tolerated before a write is forced through
    pub max_deferrals: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_secs(1),
            command_gap: Duration::from_millis(30),
            max_deferrals: 9,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn with_command_gap(mut self, gap: Duration) -> Self {
        self.command_gap = gap;
        self
    }

    pub fn with_max_deferrals(mut self, max: u32) -> Self {
        self.max_deferrals = max;
        self
    }
}
