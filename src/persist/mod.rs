/// SQLite ledger store and transaction statements.
pub mod sqlite;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Failures raised by the ledger store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl PersistError {
    /// True when the failure is a lock wait that exceeded the busy timeout.
    pub fn is_busy(&self) -> bool {
        let Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) = self else {
            return false;
        };
        matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    }
}

/// Result alias for store operations.
pub type PersistResult<T> = Result<T, PersistError>;
