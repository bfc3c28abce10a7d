use ctfledger::{
    config::LedgerConfig,
    engine::{LedgerEngine, LedgerError},
    ledger::{AwardDraft, ChallengeDraft, HintDraft, TeamDraft},
    runtime::{
        events::LedgerEvent,
        handle::{RuntimeConfig, RuntimeError, spawn_ledger},
    },
    types::{ChallengeId, HintId, TeamId},
};

fn seeded() -> (LedgerEngine, TeamId, ChallengeId, HintId) {
    let mut engine = LedgerEngine::open_in_memory(LedgerConfig::default()).expect("open");
    let team_id = engine
        .create_team(TeamDraft {
            name: "async".to_string(),
            bracket_id: None,
        })
        .expect("team")
        .id;
    let challenge_id = engine
        .create_challenge(ChallengeDraft {
            title: "misc".to_string(),
            initial_value: 200,
            min_value: 50,
            decay: 10,
        })
        .expect("challenge")
        .id;
    let hint_id = engine
        .create_hint(HintDraft {
            challenge_id,
            content: "look closer".to_string(),
            cost: 25,
            order_index: 0,
        })
        .expect("hint")
        .id;
    (engine, team_id, challenge_id, hint_id)
}

#[tokio::test]
async fn runtime_solve_unlock_award_and_events_ordered() {
    let (engine, team_id, challenge_id, hint_id) = seeded();
    let handle = spawn_ledger(engine, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let outcome = handle
        .submit_solve(team_id, 3, challenge_id)
        .await
        .expect("solve");
    assert!(outcome.first_blood);
    assert_eq!(outcome.points, 200);

    let hint = handle.unlock_hint(team_id, hint_id).await.expect("unlock");
    assert_eq!(hint.content, "look closer");

    let award = handle
        .create_award(AwardDraft {
            team_id,
            value: 10,
            description: "bonus".to_string(),
            created_by: Some(1),
        })
        .await
        .expect("award");
    assert_eq!(award.value, 10);

    assert_eq!(
        sub.recv().await.expect("event"),
        LedgerEvent::Solved {
            team_id,
            challenge_id,
            points: 200
        }
    );
    assert_eq!(
        sub.recv().await.expect("event"),
        LedgerEvent::FirstBlood {
            team_id,
            challenge_id
        }
    );
    assert_eq!(
        sub.recv().await.expect("event"),
        LedgerEvent::HintUnlocked {
            team_id,
            hint_id,
            cost: 25
        }
    );
    assert_eq!(
        sub.recv().await.expect("event"),
        LedgerEvent::AwardCreated { team_id, value: 10 }
    );

    assert_eq!(handle.team_balance(team_id).await.expect("balance"), 185);

    let board = handle.public_scoreboard(None).await.expect("board");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].points, 185);
    assert_eq!(handle.scoreboard(None, None).await.expect("board"), board);

    let blood = handle
        .first_blood(challenge_id)
        .await
        .expect("first blood")
        .expect("solved");
    assert_eq!(blood.user_id, 3);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn runtime_surfaces_business_errors_without_events() {
    let (engine, team_id, challenge_id, _) = seeded();
    let handle = spawn_ledger(engine, RuntimeConfig::default());

    handle
        .submit_solve(team_id, 1, challenge_id)
        .await
        .expect("solve");
    let mut sub = handle.subscribe();

    let err = handle
        .submit_solve(team_id, 2, challenge_id)
        .await
        .expect_err("duplicate");
    assert!(matches!(
        err.ledger(),
        Some(LedgerError::AlreadySolved { .. })
    ));
    assert!(matches!(
        sub.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn calls_after_shutdown_report_closed_channel() {
    let (engine, team_id, _, _) = seeded();
    let handle = spawn_ledger(engine, RuntimeConfig::default());
    handle.shutdown().await.expect("shutdown");

    tokio::task::yield_now().await;
    let err = handle.team_balance(team_id).await.expect_err("closed");
    assert!(matches!(err, RuntimeError::ChannelClosed));
}
