//! Ledger records, drafts, and read views.

use serde::{Deserialize, Serialize};

use crate::types::{
    AwardId, BracketId, ChallengeId, HintId, Points, SolveId, TeamId, Timestamp, UserId,
};

/// Named sub-division of teams with its own scoreboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub id: BracketId,
    pub name: String,
}

/// Competing team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable team identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Bracket membership, if any.
    pub bracket_id: Option<BracketId>,
}

/// Insert payload used to create a new [`Team`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamDraft {
    pub name: String,
    pub bracket_id: Option<BracketId>,
}

/// Challenge with its scoring parameters and derived state.
///
/// `points` always equals [`crate::scoring::dynamic_score`] applied to the
/// parameters and `solve_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Stable challenge identifier.
    pub id: ChallengeId,
    /// Display title.
    pub title: String,
    /// Value awarded to the first solver.
    pub initial_value: Points,
    /// Floor the value decays towards.
    pub min_value: Points,
    /// Number of solves until the floor is reached; `0` means static.
    pub decay: u64,
    /// Current value.
    pub points: Points,
    /// Accepted solves so far. Never decreases.
    pub solve_count: u64,
}

/// Insert payload used to create a new [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDraft {
    pub title: String,
    pub initial_value: Points,
    pub min_value: Points,
    pub decay: u64,
}

impl ChallengeDraft {
    /// Static challenge worth `value` regardless of solve count.
    pub fn fixed(title: impl Into<String>, value: Points) -> Self {
        Self {
            title: title.into(),
            initial_value: value,
            min_value: value,
            decay: 0,
        }
    }

    /// Returns a reason when the scoring parameters are inconsistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_value < 0 {
            return Err(format!("min_value {} is negative", self.min_value));
        }
        if self.min_value > self.initial_value {
            return Err(format!(
                "min_value {} exceeds initial_value {}",
                self.min_value, self.initial_value
            ));
        }
        Ok(())
    }
}

/// Accepted correct submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solve {
    /// Stable solve identifier.
    pub id: SolveId,
    /// Submitting user.
    pub user_id: UserId,
    /// Team credited with the solve.
    pub team_id: TeamId,
    /// Solved challenge.
    pub challenge_id: ChallengeId,
    /// Commit timestamp in milliseconds.
    pub solved_at: Timestamp,
}

/// Earliest solve of a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstBlood {
    pub challenge_id: ChallengeId,
    pub team_id: TeamId,
    pub team_name: String,
    pub user_id: UserId,
    pub solved_at: Timestamp,
}

/// Purchasable hint attached to a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    /// Stable hint identifier.
    pub id: HintId,
    /// Owning challenge.
    pub challenge_id: ChallengeId,
    /// Hint text revealed on unlock.
    pub content: String,
    /// Points debited on unlock. Zero-cost hints are free.
    pub cost: Points,
    /// Display order within the challenge.
    pub order_index: i64,
}

/// Insert payload used to create a new [`Hint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintDraft {
    pub challenge_id: ChallengeId,
    pub content: String,
    pub cost: Points,
    pub order_index: i64,
}

/// Hint listing entry as seen by a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintView {
    pub id: HintId,
    pub cost: Points,
    pub order_index: i64,
    pub unlocked: bool,
    pub content: Option<String>,
}

/// Record of a team having unlocked a hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintUnlock {
    pub id: u64,
    pub team_id: TeamId,
    pub hint_id: HintId,
    pub unlocked_at: Timestamp,
}

/// Signed, immutable point adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    /// Stable award identifier.
    pub id: AwardId,
    /// Credited (or debited) team.
    pub team_id: TeamId,
    /// Positive bonus or negative cost.
    pub value: Points,
    /// Human-readable reason.
    pub description: String,
    /// Admin author; `None` for system-generated debits.
    pub created_by: Option<UserId>,
    /// Creation timestamp in milliseconds.
    pub created_at: Timestamp,
}

/// Insert payload used to create a new [`Award`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardDraft {
    pub team_id: TeamId,
    pub value: Points,
    pub description: String,
    pub created_by: Option<UserId>,
}
