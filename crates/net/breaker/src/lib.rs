//! Consecutive-failure circuit breaker for peer operations.
//!
//! A [`CircuitBreaker`] wraps a fallible operation such as "dial and handshake
//! with peer X". While the operation keeps failing it is still attempted, up
//! to [`BreakerConfig::limit`] consecutive failures within
//! [`BreakerConfig::failure_window`]. At that point the breaker trips and
//! rejects calls with [`BreakerError::Open`] for a cool-down that doubles on
//! every trip, up to [`BreakerConfig::max_backoff`].
//!
//! ```text
//!            limit consecutive failures
//!  Available ───────────────────────────► Tripped
//!      ▲                                     │
//!      └─────────────────────────────────────┘
//!        backoff elapsed (next backoff doubles)
//! ```
//!
//! The operation runs outside the breaker lock, so concurrent callers never
//! wait on each other's operations. Under contention the bookkeeping is
//! approximate: two callers may both observe a pre-trip state and proceed.
//! The breaker never retries.

mod config;

pub use config::{
    BreakerConfig, DEFAULT_FAILURE_WINDOW, DEFAULT_INITIAL_BACKOFF, DEFAULT_LIMIT,
    DEFAULT_MAX_BACKOFF,
};

use std::future::Future;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, trace};
use vertex_clock::{Clock, SystemClock};

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker is tripped; the operation was not invoked.
    #[error("circuit breaker tripped")]
    Open {
        /// When the breaker lets the next call through.
        until: SystemTime,
    },
    /// The operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without running the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns the operation's own error, if it ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Open { .. } => None,
        }
    }
}

/// Whether the breaker currently lets calls through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls execute.
    Available,
    /// Calls are rejected until [`CircuitBreaker::closed_until`].
    Tripped,
}

#[derive(Debug)]
struct Counters {
    consecutive_failures: u32,
    first_failure_at: Option<SystemTime>,
    tripped_at: Option<SystemTime>,
    backoff: Duration,
}

impl Counters {
    /// Failure count and first-failure timestamp are only ever cleared together.
    fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
        self.first_failure_at = None;
    }
}

/// Gate for a fallible operation class, typically one per peer.
#[derive(Debug)]
pub struct CircuitBreaker<C = SystemClock> {
    config: BreakerConfig,
    clock: C,
    counters: Mutex<Counters>,
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker reading time from the system clock.
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker reading time from `clock`.
    ///
    /// Zero-valued configuration fields are replaced by their defaults.
    pub fn with_clock(config: BreakerConfig, clock: C) -> Self {
        let config = config.normalized();
        Self {
            counters: Mutex::new(Counters {
                consecutive_failures: 0,
                first_failure_at: None,
                tripped_at: None,
                backoff: config.initial_backoff,
            }),
            config,
            clock,
        }
    }

    /// Effective configuration, after defaults were applied.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Runs `f` unless the breaker is tripped.
    ///
    /// Returns [`BreakerError::Open`] without calling `f` if the limit of
    /// consecutive failures was reached and the cool-down has not elapsed.
    /// Otherwise returns `f`'s result, with its error wrapped in
    /// [`BreakerError::Operation`].
    pub fn execute<T, E, F>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.before()
            .map_err(|until| BreakerError::Open { until })?;
        self.after(f())
    }

    /// Async variant of [`execute`](Self::execute).
    ///
    /// The breaker lock is not held while the future runs.
    pub async fn execute_async<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.before()
            .map_err(|until| BreakerError::Open { until })?;
        let result = f().await;
        self.after(result)
    }

    /// When the breaker accepts calls again.
    ///
    /// Returns the current time if it is not tripped.
    pub fn closed_until(&self) -> SystemTime {
        let now = self.clock.now();
        let counters = self.counters.lock();
        self.closed_until_locked(&counters, now)
    }

    /// Current state.
    ///
    /// A tripped breaker stays [`BreakerState::Tripped`] after its cool-down
    /// elapsed until the next call is let through.
    pub fn state(&self) -> BreakerState {
        if self.counters.lock().consecutive_failures >= self.config.limit {
            BreakerState::Tripped
        } else {
            BreakerState::Available
        }
    }

    /// Current number of consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.counters.lock().consecutive_failures
    }

    /// Cool-down applied to the current or next trip.
    pub fn backoff(&self) -> Duration {
        self.counters.lock().backoff
    }

    fn closed_until_locked(&self, counters: &Counters, now: SystemTime) -> SystemTime {
        if counters.consecutive_failures < self.config.limit {
            return now;
        }
        counters
            .tripped_at
            .and_then(|at| at.checked_add(counters.backoff))
            .unwrap_or(now)
    }

    /// Returns `Err(until)` when the call must be rejected.
    fn before(&self) -> Result<(), SystemTime> {
        let now = self.clock.now();
        let mut counters = self.counters.lock();

        if counters.consecutive_failures >= self.config.limit {
            let cooled_down = counters
                .tripped_at
                .is_some_and(|at| elapsed(now, at) >= counters.backoff);
            if !cooled_down {
                metrics::counter!("breaker_rejections_total").increment(1);
                trace!("circuit breaker tripped, rejecting call");
                return Err(self.closed_until_locked(&counters, now));
            }

            counters.reset_failures();
            counters.backoff = counters
                .backoff
                .checked_mul(2)
                .map_or(self.config.max_backoff, |b| b.min(self.config.max_backoff));
            debug!(next_backoff = ?counters.backoff, "circuit breaker cool-down elapsed");
        }

        if let Some(first) = counters.first_failure_at {
            if elapsed(now, first) >= self.config.failure_window {
                counters.reset_failures();
            }
        }

        Ok(())
    }

    fn after<T, E>(&self, result: Result<T, E>) -> Result<T, BreakerError<E>> {
        let now = self.clock.now();
        let mut counters = self.counters.lock();

        match result {
            Ok(value) => {
                counters.reset_failures();
                Ok(value)
            }
            Err(err) => {
                if counters.consecutive_failures == 0 {
                    counters.first_failure_at = Some(now);
                }
                counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
                if counters.consecutive_failures == self.config.limit {
                    counters.tripped_at = Some(now);
                    metrics::counter!("breaker_trips_total").increment(1);
                    debug!(
                        failures = counters.consecutive_failures,
                        backoff = ?counters.backoff,
                        "circuit breaker tripped"
                    );
                }
                Err(BreakerError::Operation(err))
            }
        }
    }
}

/// Time from `earlier` to `now`, zero if the clock went backwards.
fn elapsed(now: SystemTime, earlier: SystemTime) -> Duration {
    now.duration_since(earlier).unwrap_or_default()
}
