//! SQLite-backed ledger store.
//!
//! Every mutating protocol runs inside one `BEGIN IMMEDIATE` transaction.
//! SQLite has no per-row locks: the IMMEDIATE write lock is taken at begin
//! and held until commit or rollback, and "locking" a row is a no-op
//! `UPDATE ... RETURNING` that asserts the row exists while the lock is
//! held. Any number of connections, in this process or another, sharing
//! the database file are serialized by that lock.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use crate::{
    ledger::{
        Award, AwardDraft, Bracket, Challenge, ChallengeDraft, FirstBlood, Hint, HintDraft,
        HintUnlock, Solve, Team, TeamDraft,
    },
    types::{BracketId, ChallengeId, HintId, Points, TeamId, Timestamp, UserId},
};

use super::PersistResult;

const CHALLENGE_COLUMNS: &str =
    "id, title, initial_value, min_value, decay, points, solve_count";
const SOLVE_COLUMNS: &str = "id, user_id, team_id, challenge_id, solved_at";
const HINT_COLUMNS: &str = "id, challenge_id, content, cost, order_index";
const AWARD_COLUMNS: &str = "id, team_id, value, description, created_by, created_at";

/// Connection to the ledger database.
pub struct SqliteLedger {
    conn: Connection,
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteLedger {
    /// Opens or creates the ledger at `path`.
    ///
    /// Enables WAL mode, `synchronous=NORMAL`, foreign keys, and waits up to
    /// `busy_timeout` for a competing writer before failing with `SQLITE_BUSY`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> PersistResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_connection(conn, Some(path.as_ref().to_path_buf()), busy_timeout)
    }

    /// Opens a private in-memory ledger.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, None, Duration::from_secs(5))
    }

    /// Opens an independent connection to the same database file.
    ///
    /// For in-memory ledgers this yields a new, empty database.
    pub fn reopen(&self) -> PersistResult<Self> {
        match &self.path {
            Some(path) => Self::open(path, self.busy_timeout),
            None => Self::open_in_memory(),
        }
    }

    fn init_connection(
        conn: Connection,
        path: Option<PathBuf>,
        busy_timeout: Duration,
    ) -> PersistResult<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn,
            path,
            busy_timeout,
        })
    }

    /// Starts a write transaction holding the database write lock.
    pub fn begin_write(&mut self) -> PersistResult<LedgerTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(LedgerTx { tx })
    }

    /// Starts a read transaction over a consistent snapshot.
    pub fn begin_read(&mut self) -> PersistResult<LedgerTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        Ok(LedgerTx { tx })
    }
}

/// One open ledger transaction. Dropping it without [`LedgerTx::commit`]
/// rolls back every statement issued through it.
pub struct LedgerTx<'c> {
    tx: Transaction<'c>,
}

impl LedgerTx<'_> {
    /// Commits the transaction and releases the write lock.
    pub fn commit(self) -> PersistResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Places the challenge row under the transaction's lock and reads it.
    pub fn lock_challenge(&self, id: ChallengeId) -> PersistResult<Option<Challenge>> {
        let sql = format!(
            "UPDATE challenges SET solve_count = solve_count WHERE id = ?1 RETURNING {CHALLENGE_COLUMNS}"
        );
        let challenge = self
            .tx
            .query_row(&sql, params![id as i64], challenge_from_row)
            .optional()?;
        Ok(challenge)
    }

    /// Reads a challenge without locking it.
    pub fn get_challenge(&self, id: ChallengeId) -> PersistResult<Option<Challenge>> {
        let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1");
        let challenge = self
            .tx
            .query_row(&sql, params![id as i64], challenge_from_row)
            .optional()?;
        Ok(challenge)
    }

    /// Increments the solve counter and returns the new count.
    pub fn increment_solve_count(&self, id: ChallengeId) -> PersistResult<u64> {
        let count: i64 = self.tx.query_row(
            "UPDATE challenges SET solve_count = solve_count + 1 WHERE id = ?1 RETURNING solve_count",
            params![id as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Persists a recomputed challenge value.
    pub fn update_challenge_points(&self, id: ChallengeId, points: Points) -> PersistResult<()> {
        self.tx.execute(
            "UPDATE challenges SET points = ?2 WHERE id = ?1",
            params![id as i64, points],
        )?;
        Ok(())
    }

    /// Looks up the solve of `challenge_id` by `team_id`, if any.
    pub fn find_solve(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> PersistResult<Option<Solve>> {
        let sql =
            format!("SELECT {SOLVE_COLUMNS} FROM solves WHERE team_id = ?1 AND challenge_id = ?2");
        let solve = self
            .tx
            .query_row(
                &sql,
                params![team_id as i64, challenge_id as i64],
                solve_from_row,
            )
            .optional()?;
        Ok(solve)
    }

    /// Inserts a solve row.
    pub fn insert_solve(
        &self,
        user_id: UserId,
        team_id: TeamId,
        challenge_id: ChallengeId,
        solved_at: Timestamp,
    ) -> PersistResult<Solve> {
        self.tx.execute(
            "INSERT INTO solves(user_id, team_id, challenge_id, solved_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id as i64,
                team_id as i64,
                challenge_id as i64,
                solved_at as i64
            ],
        )?;
        Ok(Solve {
            id: self.tx.last_insert_rowid() as u64,
            user_id,
            team_id,
            challenge_id,
            solved_at,
        })
    }

    /// Earliest solve of a challenge.
    pub fn first_blood(&self, challenge_id: ChallengeId) -> PersistResult<Option<FirstBlood>> {
        let entry = self
            .tx
            .query_row(
                "SELECT s.team_id, t.name, s.user_id, s.solved_at
                 FROM solves s JOIN teams t ON t.id = s.team_id
                 WHERE s.challenge_id = ?1
                 ORDER BY s.solved_at ASC, s.id ASC
                 LIMIT 1",
                params![challenge_id as i64],
                |row| {
                    Ok(FirstBlood {
                        challenge_id,
                        team_id: row.get::<_, i64>(0)? as u64,
                        team_name: row.get(1)?,
                        user_id: row.get::<_, i64>(2)? as u64,
                        solved_at: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Places the team row under the transaction's lock and reads it.
    pub fn lock_team(&self, id: TeamId) -> PersistResult<Option<Team>> {
        let team = self
            .tx
            .query_row(
                "UPDATE teams SET name = name WHERE id = ?1 RETURNING id, name, bracket_id",
                params![id as i64],
                team_from_row,
            )
            .optional()?;
        Ok(team)
    }

    /// Reads a team without locking it.
    pub fn get_team(&self, id: TeamId) -> PersistResult<Option<Team>> {
        let team = self
            .tx
            .query_row(
                "SELECT id, name, bracket_id FROM teams WHERE id = ?1",
                params![id as i64],
                team_from_row,
            )
            .optional()?;
        Ok(team)
    }

    /// Sum of the team's current solve values plus all of its awards.
    pub fn team_balance(&self, team_id: TeamId) -> PersistResult<Points> {
        let balance: i64 = self.tx.query_row(
            "SELECT
                COALESCE((SELECT SUM(c.points) FROM solves s
                          JOIN challenges c ON c.id = s.challenge_id
                          WHERE s.team_id = ?1), 0)
              + COALESCE((SELECT SUM(value) FROM awards WHERE team_id = ?1), 0)",
            params![team_id as i64],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    /// Reads a hint.
    pub fn get_hint(&self, id: HintId) -> PersistResult<Option<Hint>> {
        let sql = format!("SELECT {HINT_COLUMNS} FROM hints WHERE id = ?1");
        let hint = self
            .tx
            .query_row(&sql, params![id as i64], hint_from_row)
            .optional()?;
        Ok(hint)
    }

    /// Hints of a challenge in display order.
    pub fn hints_for_challenge(&self, challenge_id: ChallengeId) -> PersistResult<Vec<Hint>> {
        let sql = format!(
            "SELECT {HINT_COLUMNS} FROM hints WHERE challenge_id = ?1 ORDER BY order_index ASC, id ASC"
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map(params![challenge_id as i64], hint_from_row)?;
        collect_rows(rows)
    }

    /// Looks up the unlock of `hint_id` by `team_id`, if any.
    pub fn find_hint_unlock(
        &self,
        team_id: TeamId,
        hint_id: HintId,
    ) -> PersistResult<Option<HintUnlock>> {
        let unlock = self
            .tx
            .query_row(
                "SELECT id, team_id, hint_id, unlocked_at FROM hint_unlocks
                 WHERE team_id = ?1 AND hint_id = ?2",
                params![team_id as i64, hint_id as i64],
                hint_unlock_from_row,
            )
            .optional()?;
        Ok(unlock)
    }

    /// Ids of the challenge's hints the team has unlocked.
    pub fn unlocked_hint_ids(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> PersistResult<Vec<HintId>> {
        let mut stmt = self.tx.prepare(
            "SELECT u.hint_id FROM hint_unlocks u JOIN hints h ON h.id = u.hint_id
             WHERE u.team_id = ?1 AND h.challenge_id = ?2",
        )?;
        let rows = stmt.query_map(params![team_id as i64, challenge_id as i64], |row| {
            Ok(row.get::<_, i64>(0)? as u64)
        })?;
        collect_rows(rows)
    }

    /// Inserts a hint unlock row.
    pub fn insert_hint_unlock(
        &self,
        team_id: TeamId,
        hint_id: HintId,
        unlocked_at: Timestamp,
    ) -> PersistResult<HintUnlock> {
        self.tx.execute(
            "INSERT INTO hint_unlocks(team_id, hint_id, unlocked_at) VALUES (?1, ?2, ?3)",
            params![team_id as i64, hint_id as i64, unlocked_at as i64],
        )?;
        Ok(HintUnlock {
            id: self.tx.last_insert_rowid() as u64,
            team_id,
            hint_id,
            unlocked_at,
        })
    }

    /// Appends an award row.
    pub fn insert_award(&self, draft: AwardDraft, created_at: Timestamp) -> PersistResult<Award> {
        self.tx.execute(
            "INSERT INTO awards(team_id, value, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.team_id as i64,
                draft.value,
                draft.description,
                draft.created_by.map(|v| v as i64),
                created_at as i64
            ],
        )?;
        Ok(Award {
            id: self.tx.last_insert_rowid() as u64,
            team_id: draft.team_id,
            value: draft.value,
            description: draft.description,
            created_by: draft.created_by,
            created_at,
        })
    }

    /// Awards of a team, oldest first.
    pub fn awards_for_team(&self, team_id: TeamId) -> PersistResult<Vec<Award>> {
        let sql = format!(
            "SELECT {AWARD_COLUMNS} FROM awards WHERE team_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map(params![team_id as i64], award_from_row)?;
        collect_rows(rows)
    }

    /// Every team.
    pub fn all_teams(&self) -> PersistResult<Vec<Team>> {
        let mut stmt = self
            .tx
            .prepare("SELECT id, name, bracket_id FROM teams ORDER BY id ASC")?;
        let rows = stmt.query_map([], team_from_row)?;
        collect_rows(rows)
    }

    /// Every challenge.
    pub fn all_challenges(&self) -> PersistResult<Vec<Challenge>> {
        let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY id ASC");
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map([], challenge_from_row)?;
        collect_rows(rows)
    }

    /// Every solve in commit order.
    pub fn all_solves(&self) -> PersistResult<Vec<Solve>> {
        let sql = format!("SELECT {SOLVE_COLUMNS} FROM solves ORDER BY id ASC");
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map([], solve_from_row)?;
        collect_rows(rows)
    }

    /// Every award in commit order.
    pub fn all_awards(&self) -> PersistResult<Vec<Award>> {
        let sql = format!("SELECT {AWARD_COLUMNS} FROM awards ORDER BY id ASC");
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map([], award_from_row)?;
        collect_rows(rows)
    }

    /// Inserts a bracket.
    pub fn insert_bracket(&self, name: &str) -> PersistResult<Bracket> {
        self.tx
            .execute("INSERT INTO brackets(name) VALUES (?1)", params![name])?;
        Ok(Bracket {
            id: self.tx.last_insert_rowid() as u64,
            name: name.to_string(),
        })
    }

    /// Inserts a team.
    pub fn insert_team(&self, draft: TeamDraft) -> PersistResult<Team> {
        self.tx.execute(
            "INSERT INTO teams(name, bracket_id) VALUES (?1, ?2)",
            params![draft.name, draft.bracket_id.map(|v| v as i64)],
        )?;
        Ok(Team {
            id: self.tx.last_insert_rowid() as u64,
            name: draft.name,
            bracket_id: draft.bracket_id,
        })
    }

    /// Inserts a challenge with zero solves at its initial value.
    pub fn insert_challenge(&self, draft: ChallengeDraft) -> PersistResult<Challenge> {
        self.tx.execute(
            "INSERT INTO challenges(title, initial_value, min_value, decay, points, solve_count)
             VALUES (?1, ?2, ?3, ?4, ?2, 0)",
            params![
                draft.title,
                draft.initial_value,
                draft.min_value,
                draft.decay as i64
            ],
        )?;
        Ok(Challenge {
            id: self.tx.last_insert_rowid() as u64,
            title: draft.title,
            initial_value: draft.initial_value,
            min_value: draft.min_value,
            decay: draft.decay,
            points: draft.initial_value,
            solve_count: 0,
        })
    }

    /// Inserts a hint.
    pub fn insert_hint(&self, draft: HintDraft) -> PersistResult<Hint> {
        self.tx.execute(
            "INSERT INTO hints(challenge_id, content, cost, order_index) VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.challenge_id as i64,
                draft.content,
                draft.cost,
                draft.order_index
            ],
        )?;
        Ok(Hint {
            id: self.tx.last_insert_rowid() as u64,
            challenge_id: draft.challenge_id,
            content: draft.content,
            cost: draft.cost,
            order_index: draft.order_index,
        })
    }

    /// Looks up a bracket.
    pub fn get_bracket(&self, id: BracketId) -> PersistResult<Option<Bracket>> {
        let bracket = self
            .tx
            .query_row(
                "SELECT id, name FROM brackets WHERE id = ?1",
                params![id as i64],
                |row| {
                    Ok(Bracket {
                        id: row.get::<_, i64>(0)? as u64,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(bracket)
    }
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> PersistResult<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get::<_, i64>(0)? as u64,
        title: row.get(1)?,
        initial_value: row.get(2)?,
        min_value: row.get(3)?,
        decay: row.get::<_, i64>(4)? as u64,
        points: row.get(5)?,
        solve_count: row.get::<_, i64>(6)? as u64,
    })
}

fn solve_from_row(row: &Row<'_>) -> rusqlite::Result<Solve> {
    Ok(Solve {
        id: row.get::<_, i64>(0)? as u64,
        user_id: row.get::<_, i64>(1)? as u64,
        team_id: row.get::<_, i64>(2)? as u64,
        challenge_id: row.get::<_, i64>(3)? as u64,
        solved_at: row.get::<_, i64>(4)? as u64,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        bracket_id: row.get::<_, Option<i64>>(2)?.map(|v| v as u64),
    })
}

fn hint_from_row(row: &Row<'_>) -> rusqlite::Result<Hint> {
    Ok(Hint {
        id: row.get::<_, i64>(0)? as u64,
        challenge_id: row.get::<_, i64>(1)? as u64,
        content: row.get(2)?,
        cost: row.get(3)?,
        order_index: row.get(4)?,
    })
}

fn hint_unlock_from_row(row: &Row<'_>) -> rusqlite::Result<HintUnlock> {
    Ok(HintUnlock {
        id: row.get::<_, i64>(0)? as u64,
        team_id: row.get::<_, i64>(1)? as u64,
        hint_id: row.get::<_, i64>(2)? as u64,
        unlocked_at: row.get::<_, i64>(3)? as u64,
    })
}

fn award_from_row(row: &Row<'_>) -> rusqlite::Result<Award> {
    Ok(Award {
        id: row.get::<_, i64>(0)? as u64,
        team_id: row.get::<_, i64>(1)? as u64,
        value: row.get(2)?,
        description: row.get(3)?,
        created_by: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        created_at: row.get::<_, i64>(5)? as u64,
    })
}
