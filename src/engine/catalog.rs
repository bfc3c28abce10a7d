use crate::{
    ledger::{Bracket, Challenge, ChallengeDraft, Hint, HintDraft, Team, TeamDraft},
    types::{ChallengeId, TeamId},
};

use super::{
    LedgerEngine,
    error::{LedgerError, LedgerResult, PersistContext},
};

impl LedgerEngine {
    /// Creates a bracket.
    pub fn create_bracket(&mut self, name: &str) -> LedgerResult<Bracket> {
        let tx = self.store.begin_write().context("create_bracket.begin")?;
        let bracket = tx
            .insert_bracket(name)
            .context("create_bracket.insert")?;
        tx.commit().context("create_bracket.commit")?;
        Ok(bracket)
    }

    /// Creates a team, optionally inside an existing bracket.
    pub fn create_team(&mut self, draft: TeamDraft) -> LedgerResult<Team> {
        let tx = self.store.begin_write().context("create_team.begin")?;
        if let Some(bracket_id) = draft.bracket_id {
            if tx
                .get_bracket(bracket_id)
                .context("create_team.get_bracket")?
                .is_none()
            {
                return Err(LedgerError::BracketNotFound(bracket_id));
            }
        }
        let team = tx.insert_team(draft).context("create_team.insert")?;
        tx.commit().context("create_team.commit")?;
        Ok(team)
    }

    /// Creates a challenge with no solves at its initial value.
    pub fn create_challenge(&mut self, draft: ChallengeDraft) -> LedgerResult<Challenge> {
        draft.validate().map_err(LedgerError::InvalidChallenge)?;
        let tx = self.store.begin_write().context("create_challenge.begin")?;
        let challenge = tx
            .insert_challenge(draft)
            .context("create_challenge.insert")?;
        tx.commit().context("create_challenge.commit")?;
        Ok(challenge)
    }

    /// Attaches a hint to an existing challenge.
    pub fn create_hint(&mut self, draft: HintDraft) -> LedgerResult<Hint> {
        if draft.cost < 0 {
            return Err(LedgerError::InvalidHint(format!(
                "cost {} is negative",
                draft.cost
            )));
        }
        let tx = self.store.begin_write().context("create_hint.begin")?;
        if tx
            .get_challenge(draft.challenge_id)
            .context("create_hint.get_challenge")?
            .is_none()
        {
            return Err(LedgerError::ChallengeNotFound(draft.challenge_id));
        }
        let hint = tx.insert_hint(draft).context("create_hint.insert")?;
        tx.commit().context("create_hint.commit")?;
        Ok(hint)
    }

    /// Reads a challenge with its current value and solve count.
    pub fn challenge(&mut self, challenge_id: ChallengeId) -> LedgerResult<Challenge> {
        let tx = self.store.begin_read().context("challenge.begin")?;
        tx.get_challenge(challenge_id)
            .context("challenge.get")?
            .ok_or(LedgerError::ChallengeNotFound(challenge_id))
    }

    /// Reads a team.
    pub fn team(&mut self, team_id: TeamId) -> LedgerResult<Team> {
        let tx = self.store.begin_read().context("team.begin")?;
        tx.get_team(team_id)
            .context("team.get")?
            .ok_or(LedgerError::TeamNotFound(team_id))
    }
}
