//! Scoreboard cache coordination.
//!
//! The cache is a read-through side channel. Ledger invariants never depend
//! on it: a missed invalidation only serves a stale board until the TTL
//! expires.

/// In-process TTL cache.
pub mod memory;

use std::time::Duration;

use crate::types::BracketId;

/// Cache capability consumed by the engine.
pub trait ScoreboardCache: Send + Sync {
    /// Returns the cached payload for `key`, if present and fresh.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration);
    /// Drops every key in `keys`.
    fn invalidate(&self, keys: &[String]);
}

/// Which scoreboard a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreboardVariant {
    /// Current standings.
    Live,
    /// Standings as of the configured freeze time.
    Frozen,
}

/// Builds the cache key for a scoreboard variant and optional bracket.
pub fn scoreboard_key(variant: ScoreboardVariant, bracket: Option<BracketId>) -> String {
    match (variant, bracket) {
        (ScoreboardVariant::Live, None) => "scoreboard".to_string(),
        (ScoreboardVariant::Frozen, None) => "scoreboard:frozen".to_string(),
        (ScoreboardVariant::Live, Some(id)) => format!("scoreboard:bracket:{id}"),
        (ScoreboardVariant::Frozen, Some(id)) => format!("scoreboard:bracket:{id}:frozen"),
    }
}

/// Keys touched by a mutation for a team in `bracket`.
///
/// Frozen keys are only included while the frozen board can still change.
pub fn keys_for_mutation(bracket: Option<BracketId>, include_frozen: bool) -> Vec<String> {
    let mut keys = vec![scoreboard_key(ScoreboardVariant::Live, None)];
    if let Some(id) = bracket {
        keys.push(scoreboard_key(ScoreboardVariant::Live, Some(id)));
    }
    if include_frozen {
        keys.push(scoreboard_key(ScoreboardVariant::Frozen, None));
        if let Some(id) = bracket {
            keys.push(scoreboard_key(ScoreboardVariant::Frozen, Some(id)));
        }
    }
    keys
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ScoreboardCache for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String, _ttl: Duration) {}

    fn invalidate(&self, _keys: &[String]) {}
}
