//! Accumulator configuration
//!
//! This module holds the serde-deserializable parameters an
//! [`Accumulator`](crate::Accumulator) is constructed from. Hooks and clocks
//! are not configuration, see [`AccumulatorBuilder`](crate::AccumulatorBuilder)
//! for those.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// The default retention window, in seconds.
pub const DEFAULT_RETENTION_SECS: u64 = 60;

fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "snake_case")]
/// Configuration of an accumulator.
pub struct Config {
    /// The running total to start from, in sub-units. Callers that persist the
    /// total across restarts pass the restored value here. Default is 0.
    #[serde(default)]
    pub initial_total: u64,
    /// How long, in seconds, samples are retained for flow queries. Default is
    /// 60. Zero is accepted and retains only the two most recent samples.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_total: 0,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl Config {
    /// The retention window as a [`Duration`].
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
