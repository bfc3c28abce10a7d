use tracing::{debug, instrument};

use crate::{
    ledger::{Award, AwardDraft},
    types::TeamId,
};

use super::{
    LedgerEngine,
    error::{LedgerError, LedgerResult, PersistContext},
};

impl LedgerEngine {
    /// Appends a manual point adjustment.
    ///
    /// Awards are never updated or deleted; a correction is a new award with
    /// the opposite sign.
    #[instrument(skip(self), level = "debug")]
    pub fn create_award(&mut self, draft: AwardDraft) -> LedgerResult<Award> {
        if draft.value == 0 {
            return Err(LedgerError::InvalidAward("value cannot be 0".to_string()));
        }
        let team_id = draft.team_id;

        let tx = self.store.begin_write().context("create_award.begin")?;
        let team = tx
            .get_team(team_id)
            .context("create_award.get_team")?
            .ok_or(LedgerError::TeamNotFound(team_id))?;
        let created_at = self.clock.now_ms();
        let award = tx
            .insert_award(draft, created_at)
            .context("create_award.insert_award")?;
        tx.commit().context("create_award.commit")?;

        self.invalidate_for(team.bracket_id, created_at);
        debug!(team_id, value = award.value, "award created");
        Ok(award)
    }

    /// Awards of a team, oldest first.
    pub fn awards_for_team(&mut self, team_id: TeamId) -> LedgerResult<Vec<Award>> {
        let tx = self.store.begin_read().context("awards_for_team.begin")?;
        if tx
            .get_team(team_id)
            .context("awards_for_team.get_team")?
            .is_none()
        {
            return Err(LedgerError::TeamNotFound(team_id));
        }
        tx.awards_for_team(team_id)
            .context("awards_for_team.query")
    }
}
