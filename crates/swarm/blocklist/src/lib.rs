//! Durable, time-bounded blocklist of overlay addresses.
//!
//! The blocklist records peers the node refuses to connect to, each with the
//! time it was blocked and for how long (zero meaning indefinitely). Entries
//! live in a [`StateStore`] under `blocklist-<hex overlay>` keys, so blocks
//! survive restarts.
//!
//! Re-blocking a peer restarts its window and keeps the longer of the old and
//! new durations, with an indefinite block always winning. Expired entries
//! are deleted lazily by [`Blocklist::exists`]; [`Blocklist::peers`] only
//! filters them out.
//!
//! The read-then-write in [`Blocklist::add`] is not atomic against the store.
//! Two concurrent adds for one address may store either requested duration,
//! never anything else.

mod entry;

pub use entry::BlocklistEntry;

use std::time::Duration;

use alloy_primitives::hex;
use tracing::debug;
use vertex_clock::{Clock, SystemClock};
use vertex_storage::{StateStore, StoreError};
use vertex_swarm_primitives::OverlayAddress;

/// Store key prefix of blocklist entries.
pub const KEY_PREFIX: &str = "blocklist-";

/// Address-keyed deny-list with expiry, persisted in a [`StateStore`].
#[derive(Debug)]
pub struct Blocklist<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: StateStore> Blocklist<S> {
    /// Create a blocklist reading time from the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: StateStore, C: Clock> Blocklist<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Returns true if `overlay` is currently blocked.
    ///
    /// An expired entry is deleted from the store and reported as not blocked.
    pub fn exists(&self, overlay: &OverlayAddress) -> Result<bool, StoreError> {
        Ok(self.active_entry(overlay)?.is_some())
    }

    /// The entry currently blocking `overlay`, if any.
    ///
    /// Same lookup as [`exists`](Self::exists), including deletion of an
    /// expired entry, but hands back what was read so the caller learns when
    /// the block lifts without a second read.
    pub fn active_entry(
        &self,
        overlay: &OverlayAddress,
    ) -> Result<Option<BlocklistEntry>, StoreError> {
        let key = generate_key(overlay);
        let Some(entry) = self.get(&key)? else {
            return Ok(None);
        };

        if entry.is_expired(self.clock.now()) {
            self.store.delete(&key)?;
            metrics::counter!("blocklist_expired_total").increment(1);
            debug!(%overlay, "blocklist entry expired");
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Blocks `overlay` for `duration`, or indefinitely if `duration` is zero.
    ///
    /// If the peer is already blocked it stays blocked for the longer of the
    /// two durations, and an indefinite block is never shortened. The block
    /// window restarts from now in every case.
    pub fn add(&self, overlay: &OverlayAddress, duration: Duration) -> Result<(), StoreError> {
        let key = generate_key(overlay);
        let existing = self.get(&key)?.map(|entry| entry.duration);
        let duration = effective_duration(existing, duration);

        let entry = BlocklistEntry {
            timestamp: self.clock.now(),
            duration,
        };
        self.store.put(&key, &entry.encode()?)?;

        metrics::counter!("blocklist_additions_total").increment(1);
        debug!(%overlay, duration = %humantime::format_duration(duration), "peer blocklisted");
        Ok(())
    }

    /// All currently blocked peers.
    ///
    /// Expired entries are skipped but left in the store; they are removed
    /// the next time [`exists`](Self::exists) looks them up.
    pub fn peers(&self) -> Result<Vec<OverlayAddress>, StoreError> {
        let now = self.clock.now();
        let mut peers = Vec::new();

        self.store.iterate(KEY_PREFIX, &mut |key, value| {
            let overlay = parse_key(key)?;
            if !BlocklistEntry::decode(value)?.is_expired(now) {
                peers.push(overlay);
            }
            Ok(false)
        })?;

        Ok(peers)
    }

    /// The stored entry for `overlay`, expired or not.
    pub fn entry(&self, overlay: &OverlayAddress) -> Result<Option<BlocklistEntry>, StoreError> {
        self.get(&generate_key(overlay))
    }

    fn get(&self, key: &str) -> Result<Option<BlocklistEntry>, StoreError> {
        match self.store.get(key) {
            Ok(value) => BlocklistEntry::decode(&value).map(Some),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Duration to store when blocking for `requested` over an existing entry.
fn effective_duration(existing: Option<Duration>, requested: Duration) -> Duration {
    match existing {
        Some(current) if current.is_zero() => Duration::ZERO,
        Some(current) if !requested.is_zero() && requested < current => current,
        _ => requested,
    }
}

fn generate_key(overlay: &OverlayAddress) -> String {
    format!("{KEY_PREFIX}{}", hex::encode(overlay))
}

fn parse_key(key: &str) -> Result<OverlayAddress, StoreError> {
    let encoded = key
        .strip_prefix(KEY_PREFIX)
        .ok_or_else(|| StoreError::Codec(format!("unexpected blocklist key {key:?}")))?;
    let bytes = hex::decode(encoded)
        .map_err(|e| StoreError::Codec(format!("blocklist key {key:?}: {e}")))?;
    OverlayAddress::try_from(bytes.as_slice())
        .map_err(|e| StoreError::Codec(format!("blocklist key {key:?}: {e}")))
}
