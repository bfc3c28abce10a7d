//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Tunables for [`crate::engine::LedgerEngine`].
///
/// ```
/// use ctfledger::config::LedgerConfig;
///
/// let cfg = LedgerConfig::from_json_str(r#"{ "freeze_at": 1700000000000 }"#).unwrap();
/// assert_eq!(cfg.freeze_at, Some(1_700_000_000_000));
/// assert_eq!(cfg.scoreboard_ttl_ms, 15_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Longest wait for a competing writer's lock before failing.
    pub busy_timeout_ms: u64,
    /// Lifetime of a cached scoreboard.
    pub scoreboard_ttl_ms: u64,
    /// Scoreboard freeze instant, if the event freezes.
    pub freeze_at: Option<Timestamp>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            scoreboard_ttl_ms: 15_000,
            freeze_at: None,
        }
    }
}

impl LedgerConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// [`LedgerConfig::busy_timeout_ms`] as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// [`LedgerConfig::scoreboard_ttl_ms`] as a [`Duration`].
    pub fn scoreboard_ttl(&self) -> Duration {
        Duration::from_millis(self.scoreboard_ttl_ms)
    }

    /// True once `now` is past the freeze instant.
    pub fn is_frozen_at(&self, now: Timestamp) -> bool {
        self.freeze_at.is_some_and(|freeze| now > freeze)
    }
}
