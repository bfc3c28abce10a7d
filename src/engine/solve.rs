use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    ledger::{FirstBlood, Solve},
    scoring::value_at,
    types::{ChallengeId, Points, TeamId, UserId},
};

use super::{
    LedgerEngine,
    error::{LedgerError, LedgerResult, PersistContext},
};

/// Result of an accepted solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveOutcome {
    /// Inserted solve row.
    pub solve: Solve,
    /// Challenge value after this solve was counted.
    pub points: Points,
    /// Challenge solve count after this solve was counted.
    pub solve_count: u64,
    /// True when this was the challenge's first solve.
    pub first_blood: bool,
}

impl LedgerEngine {
    /// Records a verified-correct submission and re-scores the challenge.
    ///
    /// The challenge row is locked for the whole transaction, so concurrent
    /// solves of one challenge are totally ordered and each sees the count
    /// left by its predecessor. A second solve by the same team fails with
    /// [`LedgerError::AlreadySolved`]; retrying after any failure is safe.
    #[instrument(skip(self), level = "debug")]
    pub fn submit_solve(
        &mut self,
        team_id: TeamId,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> LedgerResult<SolveOutcome> {
        let tx = self.store.begin_write().context("submit_solve.begin")?;
        let challenge = tx
            .lock_challenge(challenge_id)
            .context("submit_solve.lock_challenge")?
            .ok_or(LedgerError::ChallengeNotFound(challenge_id))?;
        // Stamped under the lock so solve times follow commit order.
        let solved_at = self.clock.now_ms();
        let team = tx
            .get_team(team_id)
            .context("submit_solve.get_team")?
            .ok_or(LedgerError::TeamNotFound(team_id))?;

        if tx
            .find_solve(team_id, challenge_id)
            .context("submit_solve.find_solve")?
            .is_some()
        {
            debug!(team_id, challenge_id, "duplicate solve rejected");
            return Err(LedgerError::AlreadySolved {
                team_id,
                challenge_id,
            });
        }

        let first_blood = challenge.solve_count == 0;
        let solve = tx
            .insert_solve(user_id, team_id, challenge_id, solved_at)
            .context("submit_solve.insert_solve")?;
        let solve_count = tx
            .increment_solve_count(challenge_id)
            .context("submit_solve.increment_solve_count")?;

        let points = value_at(&challenge, solve_count);
        if points != challenge.points {
            tx.update_challenge_points(challenge_id, points)
                .context("submit_solve.update_challenge_points")?;
        }
        tx.commit().context("submit_solve.commit")?;

        self.invalidate_for(team.bracket_id, solved_at);

        if first_blood {
            info!(team_id, challenge_id, points, "first blood");
        } else {
            debug!(team_id, challenge_id, points, solve_count, "solve accepted");
        }

        Ok(SolveOutcome {
            solve,
            points,
            solve_count,
            first_blood,
        })
    }

    /// Earliest solve of `challenge_id`, or `None` while unsolved.
    pub fn first_blood(&mut self, challenge_id: ChallengeId) -> LedgerResult<Option<FirstBlood>> {
        let tx = self.store.begin_read().context("first_blood.begin")?;
        if tx
            .get_challenge(challenge_id)
            .context("first_blood.get_challenge")?
            .is_none()
        {
            return Err(LedgerError::ChallengeNotFound(challenge_id));
        }
        tx.first_blood(challenge_id).context("first_blood.query")
    }
}
