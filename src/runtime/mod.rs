//! Async front for [`crate::engine::LedgerEngine`].

/// Post-commit ledger events.
pub mod events;
/// Command loop and cloneable handle.
pub mod handle;
