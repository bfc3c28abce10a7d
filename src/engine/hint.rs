use hashbrown::HashSet;
use tracing::{debug, instrument};

use crate::{
    ledger::{AwardDraft, Hint, HintView},
    types::{ChallengeId, HintId, TeamId},
};

use super::{
    LedgerEngine,
    error::{LedgerError, LedgerResult, PersistContext},
};

impl LedgerEngine {
    /// Spends team points on a hint and returns it with its content.
    ///
    /// The team row stays locked from the duplicate check through commit, so
    /// every spend by one team is serialized and the balance check cannot be
    /// invalidated by a concurrent unlock. Losers of a race receive
    /// [`LedgerError::AlreadyUnlocked`] or [`LedgerError::InsufficientPoints`].
    #[instrument(skip(self), level = "debug")]
    pub fn unlock_hint(&mut self, team_id: TeamId, hint_id: HintId) -> LedgerResult<Hint> {
        let tx = self.store.begin_write().context("unlock_hint.begin")?;
        let hint = tx
            .get_hint(hint_id)
            .context("unlock_hint.get_hint")?
            .ok_or(LedgerError::HintNotFound(hint_id))?;
        let team = tx
            .lock_team(team_id)
            .context("unlock_hint.lock_team")?
            .ok_or(LedgerError::TeamNotFound(team_id))?;
        let unlocked_at = self.clock.now_ms();

        if tx
            .find_hint_unlock(team_id, hint_id)
            .context("unlock_hint.find_hint_unlock")?
            .is_some()
        {
            debug!(team_id, hint_id, "hint already unlocked");
            return Err(LedgerError::AlreadyUnlocked { team_id, hint_id });
        }

        if hint.cost > 0 {
            let balance = tx
                .team_balance(team_id)
                .context("unlock_hint.team_balance")?;
            if balance < hint.cost {
                debug!(team_id, hint_id, balance, cost = hint.cost, "hint unaffordable");
                return Err(LedgerError::InsufficientPoints {
                    balance,
                    cost: hint.cost,
                });
            }

            tx.insert_award(
                AwardDraft {
                    team_id,
                    value: -hint.cost,
                    description: format!("Hint unlock: {}", hint.id),
                    created_by: None,
                },
                unlocked_at,
            )
            .context("unlock_hint.insert_award")?;
        }

        tx.insert_hint_unlock(team_id, hint_id, unlocked_at)
            .context("unlock_hint.insert_hint_unlock")?;
        tx.commit().context("unlock_hint.commit")?;

        if hint.cost > 0 {
            self.invalidate_for(team.bracket_id, unlocked_at);
        }
        debug!(team_id, hint_id, cost = hint.cost, "hint unlocked");

        Ok(hint)
    }

    /// Hints of a challenge as `team_id` sees them.
    ///
    /// Content is withheld unless the team unlocked the hint or it is free.
    /// Without a team every paid hint is withheld.
    pub fn hints_for_team(
        &mut self,
        challenge_id: ChallengeId,
        team_id: Option<TeamId>,
    ) -> LedgerResult<Vec<HintView>> {
        let tx = self.store.begin_read().context("hints_for_team.begin")?;
        if tx
            .get_challenge(challenge_id)
            .context("hints_for_team.get_challenge")?
            .is_none()
        {
            return Err(LedgerError::ChallengeNotFound(challenge_id));
        }

        let hints = tx
            .hints_for_challenge(challenge_id)
            .context("hints_for_team.hints_for_challenge")?;
        let unlocked: HashSet<HintId> = match team_id {
            Some(team_id) => tx
                .unlocked_hint_ids(team_id, challenge_id)
                .context("hints_for_team.unlocked_hint_ids")?
                .into_iter()
                .collect(),
            None => HashSet::new(),
        };

        Ok(hints
            .into_iter()
            .map(|hint| {
                let is_unlocked = unlocked.contains(&hint.id);
                HintView {
                    id: hint.id,
                    cost: hint.cost,
                    order_index: hint.order_index,
                    unlocked: is_unlocked,
                    content: (is_unlocked || hint.cost <= 0).then_some(hint.content),
                }
            })
            .collect())
    }
}
