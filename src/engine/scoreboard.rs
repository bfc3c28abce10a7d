//! Scoreboard aggregation.
//!
//! Live boards value every solve at the challenge's current points, so
//! decay is retroactive. Frozen boards only see solves and awards committed
//! at or before the freeze instant, and value each challenge at its
//! pre-freeze solve count so later solves cannot move frozen totals.

use std::cmp::Ordering;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{
    cache::{ScoreboardVariant, scoreboard_key},
    ledger::{Award, Challenge, Solve, Team},
    scoring::value_at,
    types::{BracketId, ChallengeId, Points, TeamId, Timestamp},
};

use super::{
    LedgerEngine,
    error::{LedgerError, LedgerResult, PersistContext},
};

/// One ranked scoreboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    /// Team identifier.
    pub team_id: TeamId,
    /// Team display name.
    pub team_name: String,
    /// Solve values plus award values.
    pub points: Points,
    /// Latest contributing solve, if any.
    pub last_solve_at: Option<Timestamp>,
}

/// Raw ledger rows a scoreboard is computed from.
#[derive(Debug, Clone, Default)]
pub struct ScoreboardInput {
    /// All teams.
    pub teams: Vec<Team>,
    /// All challenges with their current values.
    pub challenges: Vec<Challenge>,
    /// All solves.
    pub solves: Vec<Solve>,
    /// All awards.
    pub awards: Vec<Award>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    points: Points,
    last_solve_at: Option<Timestamp>,
}

/// Ranks teams by total points.
///
/// Ties go to the team whose last contributing solve came first; teams
/// without solves rank after those with solves, then by id. Only teams in
/// `bracket` are listed when it is set, but values still count every team's
/// solves.
pub fn aggregate(
    input: &ScoreboardInput,
    frozen_at: Option<Timestamp>,
    bracket: Option<BracketId>,
) -> Vec<ScoreboardEntry> {
    let visible = |at: Timestamp| frozen_at.is_none_or(|freeze| at <= freeze);

    let solves: Vec<&Solve> = input.solves.iter().filter(|s| visible(s.solved_at)).collect();

    let values: HashMap<ChallengeId, Points> = match frozen_at {
        None => input.challenges.iter().map(|c| (c.id, c.points)).collect(),
        Some(_) => {
            let mut counts: HashMap<ChallengeId, u64> = HashMap::new();
            for solve in &solves {
                *counts.entry(solve.challenge_id).or_default() += 1;
            }
            input
                .challenges
                .iter()
                .map(|c| (c.id, value_at(c, counts.get(&c.id).copied().unwrap_or(0))))
                .collect()
        }
    };

    let mut tallies: HashMap<TeamId, Tally> = HashMap::new();
    for solve in &solves {
        let Some(value) = values.get(&solve.challenge_id) else {
            continue;
        };
        let tally = tallies.entry(solve.team_id).or_default();
        tally.points += value;
        tally.last_solve_at = Some(
            tally
                .last_solve_at
                .map_or(solve.solved_at, |last| last.max(solve.solved_at)),
        );
    }
    for award in input.awards.iter().filter(|a| visible(a.created_at)) {
        tallies.entry(award.team_id).or_default().points += award.value;
    }

    let mut entries: Vec<ScoreboardEntry> = input
        .teams
        .iter()
        .filter(|team| bracket.is_none() || team.bracket_id == bracket)
        .map(|team| {
            let tally = tallies.get(&team.id).copied().unwrap_or_default();
            ScoreboardEntry {
                team_id: team.id,
                team_name: team.name.clone(),
                points: tally.points,
                last_solve_at: tally.last_solve_at,
            }
        })
        .collect();

    entries.sort_by(rank_order);
    entries
}

fn rank_order(a: &ScoreboardEntry, b: &ScoreboardEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| match (a.last_solve_at, b.last_solve_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.team_id.cmp(&b.team_id))
}

impl LedgerEngine {
    /// Ranked standings, live or as of `frozen_at`, optionally per bracket.
    ///
    /// The live board and the board frozen at the configured freeze instant
    /// are served read-through from the cache. Other freeze instants are
    /// always computed.
    #[instrument(skip(self), level = "debug")]
    pub fn scoreboard(
        &mut self,
        frozen_at: Option<Timestamp>,
        bracket: Option<BracketId>,
    ) -> LedgerResult<Vec<ScoreboardEntry>> {
        let key = self.cache_key(frozen_at, bracket);

        if let Some(key) = key.as_deref() {
            if let Some(payload) = self.cache.get(key) {
                match serde_json::from_str::<Vec<ScoreboardEntry>>(&payload) {
                    Ok(entries) => return Ok(entries),
                    Err(err) => warn!(key, error = %err, "discarding undecodable cached scoreboard"),
                }
            }
        }

        let input = self.load_scoreboard_input(bracket)?;
        let entries = aggregate(&input, frozen_at, bracket);

        if let Some(key) = key.as_deref() {
            match serde_json::to_string(&entries) {
                Ok(payload) => self.cache.set(key, payload, self.config.scoreboard_ttl()),
                Err(err) => warn!(key, error = %err, "scoreboard not cached"),
            }
        }
        Ok(entries)
    }

    /// Standings as the public should see them right now: frozen once the
    /// configured freeze instant has passed, live before that.
    pub fn public_scoreboard(
        &mut self,
        bracket: Option<BracketId>,
    ) -> LedgerResult<Vec<ScoreboardEntry>> {
        let now = self.clock.now_ms();
        let frozen_at = self
            .config
            .freeze_at
            .filter(|_| self.config.is_frozen_at(now));
        self.scoreboard(frozen_at, bracket)
    }

    /// Current derived balance: solve values plus awards.
    pub fn team_balance(&mut self, team_id: TeamId) -> LedgerResult<Points> {
        let tx = self.store.begin_read().context("team_balance.begin")?;
        if tx
            .get_team(team_id)
            .context("team_balance.get_team")?
            .is_none()
        {
            return Err(LedgerError::TeamNotFound(team_id));
        }
        tx.team_balance(team_id).context("team_balance.query")
    }

    fn load_scoreboard_input(
        &mut self,
        bracket: Option<BracketId>,
    ) -> LedgerResult<ScoreboardInput> {
        let tx = self.store.begin_read().context("scoreboard.begin")?;
        if let Some(bracket_id) = bracket {
            if tx
                .get_bracket(bracket_id)
                .context("scoreboard.get_bracket")?
                .is_none()
            {
                return Err(LedgerError::BracketNotFound(bracket_id));
            }
        }
        Ok(ScoreboardInput {
            teams: tx.all_teams().context("scoreboard.teams")?,
            challenges: tx.all_challenges().context("scoreboard.challenges")?,
            solves: tx.all_solves().context("scoreboard.solves")?,
            awards: tx.all_awards().context("scoreboard.awards")?,
        })
    }

    fn cache_key(&self, frozen_at: Option<Timestamp>, bracket: Option<BracketId>) -> Option<String> {
        match frozen_at {
            None => Some(scoreboard_key(ScoreboardVariant::Live, bracket)),
            Some(at) if self.config.freeze_at == Some(at) => {
                Some(scoreboard_key(ScoreboardVariant::Frozen, bracket))
            }
            Some(_) => None,
        }
    }
}
