use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::warn;

use crate::{
    engine::{
        LedgerEngine, LedgerError, LedgerResult, scoreboard::ScoreboardEntry, solve::SolveOutcome,
    },
    ledger::{Award, AwardDraft, FirstBlood, Hint},
    types::{BracketId, ChallengeId, HintId, Points, TeamId, Timestamp, UserId},
};

use super::events::LedgerEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger runtime channel closed")]
    ChannelClosed,
    #[error("ledger worker failed: {0}")]
    Join(String),
}

impl RuntimeError {
    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

pub struct LedgerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<LedgerEvent>,
}

impl Clone for LedgerHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    SubmitSolve {
        team_id: TeamId,
        user_id: UserId,
        challenge_id: ChallengeId,
        resp: Reply<SolveOutcome>,
    },
    UnlockHint {
        team_id: TeamId,
        hint_id: HintId,
        resp: Reply<Hint>,
    },
    CreateAward {
        draft: AwardDraft,
        resp: Reply<Award>,
    },
    Scoreboard {
        frozen_at: Option<Timestamp>,
        bracket: Option<BracketId>,
        resp: Reply<Vec<ScoreboardEntry>>,
    },
    PublicScoreboard {
        bracket: Option<BracketId>,
        resp: Reply<Vec<ScoreboardEntry>>,
    },
    TeamBalance {
        team_id: TeamId,
        resp: Reply<Points>,
    },
    FirstBlood {
        challenge_id: ChallengeId,
        resp: Reply<Option<FirstBlood>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

pub fn spawn_ledger(engine: LedgerEngine, config: RuntimeConfig) -> LedgerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<LedgerEvent>(config.event_capacity);

    let events_tx_loop = events_tx.clone();
    let engine = Arc::new(Mutex::new(engine));

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &engine, &events_tx_loop).await {
                break;
            }
        }
    });

    LedgerHandle { cmd_tx, events_tx }
}

impl LedgerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events_tx.subscribe()
    }

    pub async fn submit_solve(
        &self,
        team_id: TeamId,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<SolveOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SubmitSolve {
            team_id,
            user_id,
            challenge_id,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn unlock_hint(&self, team_id: TeamId, hint_id: HintId) -> Result<Hint, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::UnlockHint {
            team_id,
            hint_id,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn create_award(&self, draft: AwardDraft) -> Result<Award, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::CreateAward { draft, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn scoreboard(
        &self,
        frozen_at: Option<Timestamp>,
        bracket: Option<BracketId>,
    ) -> Result<Vec<ScoreboardEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Scoreboard {
            frozen_at,
            bracket,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn public_scoreboard(
        &self,
        bracket: Option<BracketId>,
    ) -> Result<Vec<ScoreboardEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::PublicScoreboard { bracket, resp: tx })
            .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn team_balance(&self, team_id: TeamId) -> Result<Points, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::TeamBalance { team_id, resp: tx })
            .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn first_blood(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Option<FirstBlood>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::FirstBlood {
            challenge_id,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    engine: &Arc<Mutex<LedgerEngine>>,
    events_tx: &broadcast::Sender<LedgerEvent>,
) -> bool {
    match cmd {
        Command::SubmitSolve {
            team_id,
            user_id,
            challenge_id,
            resp,
        } => {
            let res = run_blocking(engine, move |e| {
                e.submit_solve(team_id, user_id, challenge_id)
            })
            .await;
            if let Ok(outcome) = &res {
                let _ = events_tx.send(LedgerEvent::Solved {
                    team_id,
                    challenge_id,
                    points: outcome.points,
                });
                if outcome.first_blood {
                    let _ = events_tx.send(LedgerEvent::FirstBlood {
                        team_id,
                        challenge_id,
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::UnlockHint {
            team_id,
            hint_id,
            resp,
        } => {
            let res = run_blocking(engine, move |e| e.unlock_hint(team_id, hint_id)).await;
            if let Ok(hint) = &res {
                let _ = events_tx.send(LedgerEvent::HintUnlocked {
                    team_id,
                    hint_id,
                    cost: hint.cost,
                });
            }
            let _ = resp.send(res);
        }
        Command::CreateAward { draft, resp } => {
            let res = run_blocking(engine, move |e| e.create_award(draft)).await;
            if let Ok(award) = &res {
                let _ = events_tx.send(LedgerEvent::AwardCreated {
                    team_id: award.team_id,
                    value: award.value,
                });
            }
            let _ = resp.send(res);
        }
        Command::Scoreboard {
            frozen_at,
            bracket,
            resp,
        } => {
            let res = run_blocking(engine, move |e| e.scoreboard(frozen_at, bracket)).await;
            let _ = resp.send(res);
        }
        Command::PublicScoreboard { bracket, resp } => {
            let res = run_blocking(engine, move |e| e.public_scoreboard(bracket)).await;
            let _ = resp.send(res);
        }
        Command::TeamBalance { team_id, resp } => {
            let res = run_blocking(engine, move |e| e.team_balance(team_id)).await;
            let _ = resp.send(res);
        }
        Command::FirstBlood { challenge_id, resp } => {
            let res = run_blocking(engine, move |e| e.first_blood(challenge_id)).await;
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }
    false
}

async fn run_blocking<T, F>(engine: &Arc<Mutex<LedgerEngine>>, op: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce(&mut LedgerEngine) -> LedgerResult<T> + Send + 'static,
{
    let engine = Arc::clone(engine);
    match tokio::task::spawn_blocking(move || {
        let mut engine = engine.blocking_lock();
        op(&mut engine)
    })
    .await
    {
        Ok(res) => {
            if let Err(err) = &res {
                if !err.is_business() && !err.is_not_found() {
                    warn!(code = err.code(), error = %err, "ledger operation failed");
                }
            }
            res.map_err(RuntimeError::from)
        }
        Err(err) => Err(RuntimeError::Join(err.to_string())),
    }
}
