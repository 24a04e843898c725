//! Connection gate for overlay peers.
//!
//! [`PeerGuard`] is consulted before dialing a peer. A peer on the
//! [`Blocklist`] is refused outright; otherwise the dial runs through that
//! peer's own [`CircuitBreaker`], which rejects it while the peer is backing
//! off after repeated failures.
//!
//! The guard never blocklists on its own. Whether a failure warrants a block
//! is decided by the caller, which then calls [`PeerGuard::block`].

mod config;

pub use config::{ConfigError, PeerGuardConfig};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tracing::{debug, trace};
use vertex_clock::{Clock, SystemClock};
use vertex_net_breaker::{BreakerError, BreakerState, CircuitBreaker};
use vertex_storage::{StateStore, StoreError};
use vertex_swarm_blocklist::Blocklist;
use vertex_swarm_primitives::OverlayAddress;

/// Why [`PeerGuard::connect`] did not produce a connection.
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    /// The peer is blocklisted; the dial was not attempted.
    #[error("peer is blocklisted")]
    Blocklisted {
        /// When the block lifts, `None` if it is indefinite.
        until: Option<SystemTime>,
    },
    /// The peer's breaker is tripped; the dial was not attempted.
    #[error("peer is backing off")]
    Backoff {
        /// When the next dial is let through.
        until: SystemTime,
    },
    /// The dial ran and failed.
    #[error(transparent)]
    Dial(E),
    /// The blocklist store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Blocklist plus one circuit breaker per peer.
#[derive(Debug)]
pub struct PeerGuard<S, C = SystemClock> {
    config: PeerGuardConfig,
    blocklist: Blocklist<S, C>,
    breakers: DashMap<OverlayAddress, Arc<CircuitBreaker<C>>>,
    clock: C,
}

impl<S: StateStore> PeerGuard<S> {
    /// Create a guard reading time from the system clock.
    pub fn new(store: S, config: PeerGuardConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: StateStore, C: Clock + Clone> PeerGuard<S, C> {
    pub fn with_clock(store: S, config: PeerGuardConfig, clock: C) -> Self {
        Self {
            config,
            blocklist: Blocklist::with_clock(store, clock.clone()),
            breakers: DashMap::new(),
            clock,
        }
    }

    pub fn config(&self) -> &PeerGuardConfig {
        &self.config
    }

    pub fn blocklist(&self) -> &Blocklist<S, C> {
        &self.blocklist
    }

    /// Run `dial` against `overlay` if the peer is neither blocklisted nor
    /// backing off.
    pub async fn connect<T, E, F, Fut>(
        &self,
        overlay: &OverlayAddress,
        dial: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(entry) = self.blocklist.active_entry(overlay)? {
            let until = entry.expires_at();
            metrics::counter!("peer_guard_rejections_total", "reason" => "blocklisted")
                .increment(1);
            debug!(%overlay, "dial refused, peer blocklisted");
            return Err(GuardError::Blocklisted { until });
        }

        trace!(%overlay, "dialing peer");
        let breaker = self.breaker(overlay);
        breaker.execute_async(dial).await.map_err(|err| match err {
            BreakerError::Open { until } => {
                metrics::counter!("peer_guard_rejections_total", "reason" => "backoff")
                    .increment(1);
                debug!(%overlay, "dial refused, peer backing off");
                GuardError::Backoff { until }
            }
            BreakerError::Operation(err) => GuardError::Dial(err),
        })
    }

    /// Blocklist `overlay` for `duration`, or indefinitely if zero.
    pub fn block(&self, overlay: &OverlayAddress, duration: Duration) -> Result<(), StoreError> {
        self.blocklist.add(overlay, duration)
    }

    pub fn is_blocked(&self, overlay: &OverlayAddress) -> Result<bool, StoreError> {
        self.blocklist.exists(overlay)
    }

    /// All currently blocklisted peers.
    pub fn blocklisted(&self) -> Result<Vec<OverlayAddress>, StoreError> {
        self.blocklist.peers()
    }

    /// When the peer's breaker lets the next dial through. Now, for a peer
    /// without breaker state.
    pub fn closed_until(&self, overlay: &OverlayAddress) -> SystemTime {
        match self.breakers.get(overlay) {
            Some(breaker) => breaker.closed_until(),
            None => self.clock.now(),
        }
    }

    pub fn breaker_state(&self, overlay: &OverlayAddress) -> BreakerState {
        self.breakers
            .get(overlay)
            .map_or(BreakerState::Available, |breaker| breaker.state())
    }

    /// Drop the breaker state of `overlay`, e.g. after it disconnected.
    ///
    /// A tripped breaker is kept until its cool-down is over. Returns true if
    /// state was removed.
    pub fn forget(&self, overlay: &OverlayAddress) -> bool {
        self.breakers
            .remove_if(overlay, |_, breaker| {
                breaker.state() == BreakerState::Available
            })
            .is_some()
    }

    /// Number of peers with breaker state.
    pub fn tracked(&self) -> usize {
        self.breakers.len()
    }

    fn breaker(&self, overlay: &OverlayAddress) -> Arc<CircuitBreaker<C>> {
        self.breakers
            .entry(*overlay)
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_clock(
                    self.config.breaker,
                    self.clock.clone(),
                ))
            })
            .clone()
    }
}
