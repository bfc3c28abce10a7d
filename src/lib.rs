//! Concurrency-safe scoring and point ledger for competitive events.
//!
//! Teams record solves of challenges whose value decays with every solve,
//! spend points on hints, and receive manual awards. Every mutation runs as
//! one SQLite transaction that serializes competing writers, so duplicate
//! solves and overdrawn hint spends are impossible even across processes.
//!
//! # Examples
//!
//! Direct engine usage:
//! ```
//! use ctfledger::{
//!     config::LedgerConfig,
//!     engine::{LedgerEngine, LedgerError},
//!     ledger::{ChallengeDraft, TeamDraft},
//! };
//!
//! let mut engine = LedgerEngine::open_in_memory(LedgerConfig::default()).expect("open");
//! let team = engine
//!     .create_team(TeamDraft { name: "blue".to_string(), bracket_id: None })
//!     .expect("team");
//! let chall = engine
//!     .create_challenge(ChallengeDraft {
//!         title: "warmup".to_string(),
//!         initial_value: 500,
//!         min_value: 100,
//!         decay: 20,
//!     })
//!     .expect("challenge");
//!
//! let outcome = engine.submit_solve(team.id, 7, chall.id).expect("solve");
//! assert_eq!(outcome.points, 500);
//! assert!(outcome.first_blood);
//!
//! let again = engine.submit_solve(team.id, 7, chall.id);
//! assert!(matches!(again, Err(LedgerError::AlreadySolved { .. })));
//! ```
//!
//! Async usage through the runtime handle:
//! ```no_run
//! use ctfledger::{
//!     config::LedgerConfig,
//!     engine::LedgerEngine,
//!     runtime::handle::{spawn_ledger, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = LedgerEngine::open("ledger.db", LedgerConfig::default()).expect("open");
//! let handle = spawn_ledger(engine, RuntimeConfig::default());
//! let board = handle.public_scoreboard(None).await.expect("scoreboard");
//! println!("{} teams ranked", board.len());
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Scoreboard cache coordination.
pub mod cache;
/// Clock capability.
pub mod clock;
/// Engine configuration.
pub mod config;
/// Solve, hint, award, and scoreboard operations.
pub mod engine;
/// Ledger records and drafts.
pub mod ledger;
/// Ledger store abstraction and SQLite implementation.
pub mod persist;
/// Async runtime handle and events.
pub mod runtime;
/// Dynamic challenge scoring.
pub mod scoring;
/// Shared primitive types.
pub mod types;
