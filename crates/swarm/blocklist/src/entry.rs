//! Persisted blocklist entry and its encoding.

use std::fmt::Write;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use vertex_storage::StoreError;

/// A stored block: when it was (re)applied and for how long.
///
/// A zero `duration` blocks indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlocklistEntry {
    pub timestamp: SystemTime,
    pub duration: Duration,
}

/// First instant RFC 3339 cannot represent (year 10000).
const RFC3339_END: Duration = Duration::from_secs(253_402_300_800);

/// On-disk form. The duration is kept as a human-readable span so the value
/// stays plain JSON.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    timestamp: String,
    duration: String,
}

impl BlocklistEntry {
    /// Returns true if the block never lifts on its own.
    pub fn is_indefinite(&self) -> bool {
        self.duration.is_zero()
    }

    /// Returns true if more than `duration` has passed since `timestamp`.
    ///
    /// Indefinite entries never expire. A timestamp in the future counts as
    /// no time passed.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        if self.is_indefinite() {
            return false;
        }
        now.duration_since(self.timestamp).unwrap_or_default() > self.duration
    }

    /// Last instant at which the entry still blocks, `None` if indefinite.
    pub fn expires_at(&self) -> Option<SystemTime> {
        if self.is_indefinite() {
            return None;
        }
        self.timestamp.checked_add(self.duration)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let stored = StoredEntry {
            timestamp: encode_timestamp(self.timestamp)?,
            duration: humantime::format_duration(self.duration).to_string(),
        };
        serde_json::to_vec(&stored).map_err(|e| StoreError::Codec(e.to_string()))
    }

    pub(crate) fn decode(value: &[u8]) -> Result<Self, StoreError> {
        let stored: StoredEntry =
            serde_json::from_slice(value).map_err(|e| StoreError::Codec(e.to_string()))?;
        let timestamp = humantime::parse_rfc3339(&stored.timestamp)
            .map_err(|e| StoreError::Codec(format!("timestamp {:?}: {e}", stored.timestamp)))?;
        let duration = humantime::parse_duration(&stored.duration)
            .map_err(|e| StoreError::Codec(format!("duration {:?}: {e}", stored.duration)))?;
        Ok(Self {
            timestamp,
            duration,
        })
    }
}

/// RFC 3339 rendering, for instants between the unix epoch and year 10000.
fn encode_timestamp(timestamp: SystemTime) -> Result<String, StoreError> {
    let out_of_range =
        || StoreError::Codec(format!("timestamp {timestamp:?} out of RFC 3339 range"));

    let since_epoch = timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| out_of_range())?;
    if since_epoch >= RFC3339_END {
        return Err(out_of_range());
    }

    let mut encoded = String::new();
    write!(encoded, "{}", humantime::format_rfc3339_nanos(timestamp))
        .map_err(|_| out_of_range())?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const T0: Duration = Duration::from_secs(1_700_000_000);

    fn entry(duration: Duration) -> BlocklistEntry {
        BlocklistEntry {
            timestamp: SystemTime::UNIX_EPOCH + T0,
            duration,
        }
    }

    #[test]
    fn encoding_is_readable_json() {
        let encoded = entry(Duration::from_secs(600)).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(json["duration"], "10m");
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20.000000000Z");
    }

    #[test]
    fn decodes_what_it_encodes() {
        for duration in [
            Duration::ZERO,
            Duration::from_millis(1500),
            Duration::from_secs(5 * 60),
            Duration::from_secs(36 * 3600),
        ] {
            let original = BlocklistEntry {
                timestamp: SystemTime::UNIX_EPOCH + T0 + Duration::from_nanos(123),
                duration,
            };
            assert_eq!(
                BlocklistEntry::decode(&original.encode().unwrap()).unwrap(),
                original
            );
        }
    }

    #[test]
    fn malformed_values_are_codec_errors() {
        assert_matches!(
            BlocklistEntry::decode(b"not json"),
            Err(StoreError::Codec(_))
        );
        assert_matches!(
            BlocklistEntry::decode(br#"{"timestamp":"yesterday","duration":"1m"}"#),
            Err(StoreError::Codec(msg)) if msg.contains("timestamp")
        );
        assert_matches!(
            BlocklistEntry::decode(br#"{"timestamp":"2023-11-14T22:13:20Z","duration":"soon"}"#),
            Err(StoreError::Codec(msg)) if msg.contains("duration")
        );
    }

    #[test]
    fn unrepresentable_timestamps_are_codec_errors() {
        let at = |timestamp| BlocklistEntry {
            timestamp,
            duration: Duration::from_secs(60),
        };

        assert_matches!(
            at(SystemTime::UNIX_EPOCH - Duration::from_secs(1)).encode(),
            Err(StoreError::Codec(msg)) if msg.contains("timestamp")
        );
        assert_matches!(
            at(SystemTime::UNIX_EPOCH + RFC3339_END).encode(),
            Err(StoreError::Codec(_))
        );

        // both ends of the range still encode
        assert!(at(SystemTime::UNIX_EPOCH).encode().is_ok());
        let last = at(SystemTime::UNIX_EPOCH + RFC3339_END - Duration::from_nanos(1));
        assert_eq!(BlocklistEntry::decode(&last.encode().unwrap()).unwrap(), last);
    }

    #[test]
    fn expiry_is_strictly_after_duration() {
        let e = entry(Duration::from_secs(60));
        let start = e.timestamp;

        assert!(!e.is_expired(start));
        assert!(!e.is_expired(start + Duration::from_secs(60)));
        assert!(e.is_expired(start + Duration::from_secs(61)));
        assert!(!e.is_expired(start - Duration::from_secs(3600)));
        assert_eq!(e.expires_at(), Some(start + Duration::from_secs(60)));
    }

    #[test]
    fn indefinite_entries_never_expire() {
        let e = entry(Duration::ZERO);
        assert!(e.is_indefinite());
        assert!(!e.is_expired(e.timestamp + Duration::from_secs(100 * 365 * 86_400)));
        assert_eq!(e.expires_at(), None);
    }
}
