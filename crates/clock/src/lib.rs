//! Wall-clock time source.
//!
//! Components that make time-based decisions read "now" through a [`Clock`]
//! handed to them at construction instead of calling [`SystemTime::now`]
//! directly. Production code uses [`SystemClock`]; tests use [`ManualClock`]
//! and move time forward explicitly.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use auto_impl::auto_impl;
use parking_lot::Mutex;

/// Source of the current wall-clock time.
#[auto_impl(&, Box, Arc)]
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and pass another into the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Move the clock backward by `by`, saturating at the unix epoch.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.checked_sub(by).unwrap_or(SystemTime::UNIX_EPOCH);
    }

    /// Jump to `at`.
    pub fn set(&self, at: SystemTime) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    /// Starts at 2023-11-14T22:13:20Z.
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}
