//! Circuit breaker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of consecutive failures that trips the breaker.
pub const DEFAULT_LIMIT: u32 = 100;

/// Default window in which consecutive failures are counted.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Default cool-down after the first trip.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2 * 60);

/// Default upper bound for the cool-down.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Durations (de)serialize in human-readable form, e.g. `"30m"` or `"1h"`.
/// A zero value for any field is replaced by its default when the breaker is
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures after which calls are rejected.
    pub limit: u32,

    /// Failures are only counted as consecutive if they happen within this
    /// window of the first one.
    #[serde(with = "humantime_serde")]
    pub failure_window: Duration,

    /// Cool-down after the first trip. Doubles after every trip.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for the cool-down.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            failure_window: DEFAULT_FAILURE_WINDOW,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl BreakerConfig {
    /// Set the consecutive failure limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the failure observation window.
    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    /// Set the cool-down after the first trip.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the cool-down cap.
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Replace zero-valued fields with their defaults.
    pub(crate) fn normalized(self) -> Self {
        fn or_default(value: Duration, default: Duration) -> Duration {
            if value.is_zero() { default } else { value }
        }

        Self {
            limit: if self.limit == 0 {
                DEFAULT_LIMIT
            } else {
                self.limit
            },
            failure_window: or_default(self.failure_window, DEFAULT_FAILURE_WINDOW),
            initial_backoff: or_default(self.initial_backoff, DEFAULT_INITIAL_BACKOFF),
            max_backoff: or_default(self.max_backoff, DEFAULT_MAX_BACKOFF),
        }
    }
}
