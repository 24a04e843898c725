//! Peer guard configuration.

use serde::{Deserialize, Serialize};
use vertex_net_breaker::BreakerConfig;

/// Configuration for a [`PeerGuard`](crate::PeerGuard).
///
/// Loaded from the `[breaker]` table of a TOML document; missing keys take
/// their defaults.
///
/// ```toml
/// [breaker]
/// limit = 10
/// failure_window = "5m"
/// initial_backoff = "30s"
/// max_backoff = "1h"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerGuardConfig {
    /// Settings shared by every per-peer breaker.
    pub breaker: BreakerConfig,
}

/// Error parsing a [`PeerGuardConfig`].
#[derive(Debug, thiserror::Error)]
#[error("invalid peer guard config: {0}")]
pub struct ConfigError(#[from] toml::de::Error);

impl PeerGuardConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}
