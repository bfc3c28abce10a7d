//! Error taxonomy for ledger operations.

use thiserror::Error;

use crate::{
    persist::PersistError,
    types::{BracketId, ChallengeId, HintId, Points, TeamId},
};

/// Ledger operation errors.
///
/// Business outcomes and not-found conditions carry stable [`LedgerError::code`]
/// strings that callers can map to user-facing responses.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The team already has a solve for this challenge.
    #[error("team {team_id} already solved challenge {challenge_id}")]
    AlreadySolved {
        /// Submitting team.
        team_id: TeamId,
        /// Target challenge.
        challenge_id: ChallengeId,
    },

    /// The team already unlocked this hint.
    #[error("team {team_id} already unlocked hint {hint_id}")]
    AlreadyUnlocked {
        /// Unlocking team.
        team_id: TeamId,
        /// Target hint.
        hint_id: HintId,
    },

    /// The team cannot afford the hint.
    #[error("insufficient points: balance {balance}, cost {cost}")]
    InsufficientPoints {
        /// Balance observed under the team lock.
        balance: Points,
        /// Hint cost.
        cost: Points,
    },

    /// Challenge not found.
    #[error("challenge not found: {0}")]
    ChallengeNotFound(ChallengeId),

    /// Hint not found.
    #[error("hint not found: {0}")]
    HintNotFound(HintId),

    /// Team not found.
    #[error("team not found: {0}")]
    TeamNotFound(TeamId),

    /// Bracket not found.
    #[error("bracket not found: {0}")]
    BracketNotFound(BracketId),

    /// Award payload rejected.
    #[error("invalid award: {0}")]
    InvalidAward(String),

    /// Challenge parameters rejected.
    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),

    /// Hint parameters rejected.
    #[error("invalid hint: {0}")]
    InvalidHint(String),

    /// Store failure, tagged with the operation step that raised it.
    #[error("{op}: {source}")]
    Persist {
        /// `operation.step` that failed.
        op: &'static str,
        /// Underlying store error.
        #[source]
        source: PersistError,
    },
}

impl LedgerError {
    /// Stable machine-readable identity.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadySolved { .. } => "already_solved",
            Self::AlreadyUnlocked { .. } => "already_unlocked",
            Self::InsufficientPoints { .. } => "insufficient_points",
            Self::ChallengeNotFound(_) => "challenge_not_found",
            Self::HintNotFound(_) => "hint_not_found",
            Self::TeamNotFound(_) => "team_not_found",
            Self::BracketNotFound(_) => "bracket_not_found",
            Self::InvalidAward(_) => "invalid_award",
            Self::InvalidChallenge(_) => "invalid_challenge",
            Self::InvalidHint(_) => "invalid_hint",
            Self::Persist { .. } => "internal",
        }
    }

    /// Expected outcome of a race or duplicate request, safe to show users.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Self::AlreadySolved { .. }
                | Self::AlreadyUnlocked { .. }
                | Self::InsufficientPoints { .. }
        )
    }

    /// Referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChallengeNotFound(_)
                | Self::HintNotFound(_)
                | Self::TeamNotFound(_)
                | Self::BracketNotFound(_)
        )
    }

    /// Transient lock contention. Retrying the whole operation is safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persist { source, .. } => source.is_busy(),
            _ => false,
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Attaches an `operation.step` label to store failures.
pub(crate) trait PersistContext<T> {
    fn context(self, op: &'static str) -> LedgerResult<T>;
}

impl<T, E: Into<PersistError>> PersistContext<T> for Result<T, E> {
    fn context(self, op: &'static str) -> LedgerResult<T> {
        self.map_err(|err| LedgerError::Persist {
            op,
            source: err.into(),
        })
    }
}
