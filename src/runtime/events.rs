//! Runtime event stream payloads.

use crate::types::{ChallengeId, HintId, Points, TeamId};

/// Events emitted after a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A solve was accepted.
    Solved {
        /// Credited team.
        team_id: TeamId,
        /// Solved challenge.
        challenge_id: ChallengeId,
        /// Challenge value after the solve.
        points: Points,
    },
    /// The first solve of a challenge was accepted.
    FirstBlood {
        /// Credited team.
        team_id: TeamId,
        /// Solved challenge.
        challenge_id: ChallengeId,
    },
    /// A hint was unlocked.
    HintUnlocked {
        /// Unlocking team.
        team_id: TeamId,
        /// Unlocked hint.
        hint_id: HintId,
        /// Points spent.
        cost: Points,
    },
    /// A manual award was recorded.
    AwardCreated {
        /// Credited team.
        team_id: TeamId,
        /// Signed value.
        value: Points,
    },
}
