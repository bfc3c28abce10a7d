//! Scoring and ledger engine.
//!
//! [`LedgerEngine`] runs each mutating protocol as one store transaction and
//! tells the scoreboard cache what changed once the transaction commits.

/// Manual point adjustments.
pub mod award;
/// Bracket, team, challenge, and hint seeding.
pub mod catalog;
/// Error taxonomy.
pub mod error;
/// Hint unlocking against the team balance.
pub mod hint;
/// Ranked team totals, live or frozen.
pub mod scoreboard;
/// Solve recording and dynamic re-scoring.
pub mod solve;

use std::path::Path;
use std::sync::Arc;

use crate::{
    cache::{NoopCache, ScoreboardCache, keys_for_mutation},
    clock::{Clock, SystemClock},
    config::LedgerConfig,
    persist::sqlite::SqliteLedger,
    types::{BracketId, Timestamp},
};

pub use error::{LedgerError, LedgerResult};

use error::PersistContext;

/// Engine bound to one store connection.
///
/// Engines built with [`LedgerEngine::reopen`] share the cache and clock but
/// hold their own connection; they behave like independent service
/// instances against the same ledger.
pub struct LedgerEngine {
    store: SqliteLedger,
    cache: Arc<dyn ScoreboardCache>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl LedgerEngine {
    /// Wraps an opened store.
    pub fn new(
        store: SqliteLedger,
        cache: Arc<dyn ScoreboardCache>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            config,
        }
    }

    /// Opens the ledger at `path` with the system clock and no cache.
    pub fn open(path: impl AsRef<Path>, config: LedgerConfig) -> LedgerResult<Self> {
        let store = SqliteLedger::open(path, config.busy_timeout()).context("open")?;
        Ok(Self::new(
            store,
            Arc::new(NoopCache),
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Opens a private in-memory ledger with the system clock and no cache.
    pub fn open_in_memory(config: LedgerConfig) -> LedgerResult<Self> {
        let store = SqliteLedger::open_in_memory().context("open_in_memory")?;
        Ok(Self::new(
            store,
            Arc::new(NoopCache),
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Opens a second engine on a fresh connection to the same ledger.
    pub fn reopen(&self) -> LedgerResult<Self> {
        let store = self.store.reopen().context("reopen")?;
        Ok(Self::new(
            store,
            Arc::clone(&self.cache),
            Arc::clone(&self.clock),
            self.config.clone(),
        ))
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current time according to the engine clock.
    pub fn now_ms(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn invalidate_for(&self, bracket: Option<BracketId>, mutated_at: Timestamp) {
        let include_frozen = !self.config.is_frozen_at(mutated_at);
        self.cache
            .invalidate(&keys_for_mutation(bracket, include_frozen));
    }
}
