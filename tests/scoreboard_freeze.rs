use std::{path::Path, sync::Arc, thread, time::Duration};

use hashbrown::HashSet;
use proptest::prelude::*;
use rusqlite::Connection;

use ctfledger::{
    cache::{ScoreboardCache, memory::MemoryCache},
    clock::ManualClock,
    config::LedgerConfig,
    engine::{
        LedgerEngine, LedgerError,
        scoreboard::{ScoreboardEntry, ScoreboardInput, aggregate},
    },
    ledger::{Award, AwardDraft, Challenge, ChallengeDraft, Solve, Team, TeamDraft},
    persist::sqlite::SqliteLedger,
    types::{BracketId, ChallengeId, TeamId},
};

const FREEZE_AT: u64 = 1_000;

struct Harness {
    engine: LedgerEngine,
    cache: Arc<MemoryCache>,
    clock: ManualClock,
}

fn harness_with(store: SqliteLedger, config: LedgerConfig) -> Harness {
    let clock = ManualClock::new(100);
    let cache = Arc::new(MemoryCache::new(Arc::new(clock.clone())));
    let engine = LedgerEngine::new(
        store,
        Arc::clone(&cache) as Arc<dyn ScoreboardCache>,
        Arc::new(clock.clone()),
        config,
    );
    Harness {
        engine,
        cache,
        clock,
    }
}

fn frozen_config() -> LedgerConfig {
    LedgerConfig {
        freeze_at: Some(FREEZE_AT),
        ..LedgerConfig::default()
    }
}

fn team(engine: &mut LedgerEngine, name: &str, bracket_id: Option<BracketId>) -> TeamId {
    engine
        .create_team(TeamDraft {
            name: name.to_string(),
            bracket_id,
        })
        .expect("team")
        .id
}

fn challenge(engine: &mut LedgerEngine) -> ChallengeId {
    engine
        .create_challenge(ChallengeDraft {
            title: "web-1".to_string(),
            initial_value: 500,
            min_value: 100,
            decay: 20,
        })
        .expect("challenge")
        .id
}

fn points_of(board: &[ScoreboardEntry]) -> Vec<(TeamId, i64)> {
    board.iter().map(|e| (e.team_id, e.points)).collect()
}

#[test]
fn frozen_board_ignores_later_solves_and_awards() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, frozen_config());
    let a = team(&mut h.engine, "alpha", None);
    let b = team(&mut h.engine, "bravo", None);
    let c = team(&mut h.engine, "charlie", None);
    let chall = challenge(&mut h.engine);

    h.clock.set(500);
    h.engine.submit_solve(a, 1, chall).expect("a");
    h.clock.set(600);
    h.engine.submit_solve(b, 2, chall).expect("b");

    h.clock.set(900);
    let before_freeze = h.engine.scoreboard(Some(FREEZE_AT), None).expect("frozen");
    assert_eq!(points_of(&before_freeze), vec![(a, 499), (b, 499), (c, 0)]);
    assert_eq!(h.engine.public_scoreboard(None).expect("public"), before_freeze);

    h.clock.set(1_500);
    h.engine.submit_solve(c, 3, chall).expect("c");
    h.engine
        .create_award(AwardDraft {
            team_id: c,
            value: 1_000,
            description: "late bonus".to_string(),
            created_by: Some(1),
        })
        .expect("award");

    let frozen = h.engine.scoreboard(Some(FREEZE_AT), None).expect("frozen");
    assert_eq!(frozen, before_freeze);
    assert_eq!(h.engine.public_scoreboard(None).expect("public"), before_freeze);

    let live = h.engine.scoreboard(None, None).expect("live");
    assert_eq!(points_of(&live), vec![(c, 1_496), (a, 496), (b, 496)]);
}

#[test]
fn freeze_instant_is_inclusive() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, frozen_config());
    let a = team(&mut h.engine, "edge", None);
    let chall = challenge(&mut h.engine);

    h.clock.set(FREEZE_AT);
    h.engine.submit_solve(a, 1, chall).expect("solve");

    let frozen = h.engine.scoreboard(Some(FREEZE_AT), None).expect("frozen");
    assert_eq!(points_of(&frozen), vec![(a, 500)]);
    assert_eq!(frozen[0].last_solve_at, Some(FREEZE_AT));
}

#[test]
fn bracket_board_lists_only_members() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, LedgerConfig::default());
    let pro = h.engine.create_bracket("open").expect("bracket").id;
    let student = h.engine.create_bracket("student").expect("bracket").id;
    let p1 = team(&mut h.engine, "p1", Some(pro));
    let s1 = team(&mut h.engine, "s1", Some(student));
    let s2 = team(&mut h.engine, "s2", Some(student));
    let loose = team(&mut h.engine, "loose", None);
    let chall = challenge(&mut h.engine);

    h.clock.set(200);
    h.engine.submit_solve(p1, 1, chall).expect("p1");
    h.clock.set(300);
    h.engine.submit_solve(s2, 2, chall).expect("s2");

    let students = h.engine.scoreboard(None, Some(student)).expect("students");
    assert_eq!(points_of(&students), vec![(s2, 499), (s1, 0)]);

    let everyone = h.engine.scoreboard(None, None).expect("all");
    assert_eq!(
        points_of(&everyone),
        vec![(p1, 499), (s2, 499), (s1, 0), (loose, 0)]
    );
}

#[test]
fn ties_break_on_earlier_last_solve_then_team_id() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, LedgerConfig::default());
    let late = team(&mut h.engine, "late", None);
    let early = team(&mut h.engine, "early", None);
    let idle_b = team(&mut h.engine, "idle-b", None);
    let idle_a = team(&mut h.engine, "idle-a", None);
    let first = h
        .engine
        .create_challenge(ChallengeDraft::fixed("one", 100))
        .expect("one")
        .id;

    h.clock.set(200);
    h.engine.submit_solve(early, 1, first).expect("early");
    h.clock.set(300);
    h.engine.submit_solve(late, 2, first).expect("late");

    let board = h.engine.scoreboard(None, None).expect("board");
    let order: Vec<TeamId> = board.iter().map(|e| e.team_id).collect();
    assert_eq!(order, vec![early, late, idle_b, idle_a]);
    assert!(idle_b < idle_a);
}

#[test]
fn live_board_is_cached_until_invalidated() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, LedgerConfig::default());
    let a = team(&mut h.engine, "cached", None);
    let chall = challenge(&mut h.engine);

    h.engine.scoreboard(None, None).expect("board");
    assert!(h.cache.get("scoreboard").is_some());

    h.engine.submit_solve(a, 1, chall).expect("solve");
    assert!(h.cache.get("scoreboard").is_none());

    let board = h.engine.scoreboard(None, None).expect("board");
    assert_eq!(points_of(&board), vec![(a, 500)]);
}

#[test]
fn cached_board_is_served_until_ttl_expires() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.db");
    let store = SqliteLedger::open(&path, Duration::from_secs(5)).expect("store");
    let mut h = harness_with(store, LedgerConfig::default());
    let a = team(&mut h.engine, "ttl", None);

    let first = h.engine.scoreboard(None, None).expect("board");
    assert_eq!(points_of(&first), vec![(a, 0)]);

    insert_award_behind_engine(&path, a, 40);

    let stale = h.engine.scoreboard(None, None).expect("board");
    assert_eq!(stale, first);

    h.clock
        .advance(LedgerConfig::default().scoreboard_ttl_ms);
    let fresh = h.engine.scoreboard(None, None).expect("board");
    assert_eq!(points_of(&fresh), vec![(a, 40)]);
}

#[test]
fn solve_waiting_on_lock_across_freeze_is_stamped_after_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.db");
    let store = SqliteLedger::open(&path, Duration::from_secs(5)).expect("store");
    let mut h = harness_with(store, frozen_config());
    let a = team(&mut h.engine, "patient", None);
    let chall = challenge(&mut h.engine);

    h.clock.set(900);
    let frozen_before = h.engine.scoreboard(Some(FREEZE_AT), None).expect("frozen");
    assert_eq!(points_of(&frozen_before), vec![(a, 0)]);

    let raw = Connection::open(&path).expect("raw open");
    raw.execute_batch("BEGIN IMMEDIATE;").expect("hold write lock");

    let mut engine = h.engine;
    let worker = thread::spawn(move || {
        let outcome = engine.submit_solve(a, 1, chall);
        (outcome, engine)
    });

    thread::sleep(Duration::from_millis(100));
    h.clock.set(1_500);
    raw.execute_batch("ROLLBACK;").expect("release");

    let (outcome, mut engine) = worker.join().expect("worker panicked");
    let outcome = outcome.expect("solve");
    assert_eq!(outcome.solve.solved_at, 1_500);
    assert!(h.cache.get("scoreboard:frozen").is_some());

    assert_eq!(
        engine.scoreboard(Some(FREEZE_AT), None).expect("frozen"),
        frozen_before
    );
    let mut uncached = LedgerEngine::open(&path, frozen_config()).expect("open");
    assert_eq!(
        uncached.scoreboard(Some(FREEZE_AT), None).expect("frozen"),
        frozen_before
    );
    assert_eq!(
        points_of(&uncached.scoreboard(None, None).expect("live")),
        vec![(a, 500)]
    );
}

#[test]
fn unknown_bracket_board_is_not_found() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, LedgerConfig::default());
    team(&mut h.engine, "a", None);

    let err = h
        .engine
        .scoreboard(None, Some(42))
        .expect_err("unknown bracket");
    assert!(matches!(err, LedgerError::BracketNotFound(42)));
    assert!(err.is_not_found());
    assert!(h.cache.is_empty());
}

fn insert_award_behind_engine(path: &Path, team_id: TeamId, value: i64) {
    let conn = Connection::open(path).expect("raw open");
    conn.execute(
        "INSERT INTO awards(team_id, value, description, created_by, created_at)
         VALUES (?1, ?2, 'manual', NULL, 100)",
        rusqlite::params![team_id as i64, value],
    )
    .expect("insert award");
}

#[test]
fn frozen_cache_survives_post_freeze_mutations() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, frozen_config());
    let bracket = h.engine.create_bracket("b").expect("bracket").id;
    let a = team(&mut h.engine, "a", Some(bracket));
    let chall = challenge(&mut h.engine);

    h.clock.set(1_200);
    h.engine.public_scoreboard(None).expect("global");
    h.engine.public_scoreboard(Some(bracket)).expect("bracket");
    h.engine.scoreboard(None, Some(bracket)).expect("live bracket");
    assert!(h.cache.get("scoreboard:frozen").is_some());
    assert!(h.cache.get(&format!("scoreboard:bracket:{bracket}:frozen")).is_some());
    assert!(h.cache.get(&format!("scoreboard:bracket:{bracket}")).is_some());

    h.engine.submit_solve(a, 1, chall).expect("solve");
    assert!(h.cache.get("scoreboard:frozen").is_some());
    assert!(h.cache.get(&format!("scoreboard:bracket:{bracket}:frozen")).is_some());
    assert!(h.cache.get(&format!("scoreboard:bracket:{bracket}")).is_none());
}

#[test]
fn pre_freeze_mutation_invalidates_frozen_keys() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, frozen_config());
    let a = team(&mut h.engine, "a", None);
    let chall = challenge(&mut h.engine);

    h.clock.set(400);
    h.engine.scoreboard(Some(FREEZE_AT), None).expect("frozen");
    assert!(h.cache.get("scoreboard:frozen").is_some());

    h.engine.submit_solve(a, 1, chall).expect("solve");
    assert!(h.cache.get("scoreboard:frozen").is_none());
}

#[test]
fn ad_hoc_freeze_instants_bypass_the_cache() {
    let store = SqliteLedger::open_in_memory().expect("store");
    let mut h = harness_with(store, frozen_config());
    team(&mut h.engine, "a", None);

    h.engine.scoreboard(Some(777), None).expect("ad hoc");
    assert!(h.cache.is_empty());
}

#[test]
fn aggregate_values_frozen_challenges_at_pre_freeze_count() {
    let input = ScoreboardInput {
        teams: vec![
            Team {
                id: 1,
                name: "one".to_string(),
                bracket_id: None,
            },
            Team {
                id: 2,
                name: "two".to_string(),
                bracket_id: None,
            },
        ],
        challenges: vec![Challenge {
            id: 7,
            title: "rev".to_string(),
            initial_value: 500,
            min_value: 100,
            decay: 20,
            points: 100,
            solve_count: 25,
        }],
        solves: vec![
            Solve {
                id: 1,
                user_id: 1,
                team_id: 1,
                challenge_id: 7,
                solved_at: 10,
            },
            Solve {
                id: 2,
                user_id: 2,
                team_id: 2,
                challenge_id: 7,
                solved_at: 50,
            },
        ],
        awards: vec![Award {
            id: 1,
            team_id: 2,
            value: -10,
            description: "hint".to_string(),
            created_by: None,
            created_at: 20,
        }],
    };

    let frozen = aggregate(&input, Some(30), None);
    assert_eq!(points_of(&frozen), vec![(1, 500), (2, -10)]);
    assert_eq!(frozen[1].last_solve_at, None);

    let live = aggregate(&input, None, None);
    assert_eq!(points_of(&live), vec![(1, 100), (2, 90)]);
}

fn random_input(raw: &[(u8, u8, u16)]) -> ScoreboardInput {
    let teams = (1..=6)
        .map(|id| Team {
            id,
            name: format!("t{id}"),
            bracket_id: None,
        })
        .collect();
    let challenges = (1..=3)
        .map(|id| Challenge {
            id,
            title: format!("c{id}"),
            initial_value: 500,
            min_value: 100,
            decay: 4,
            points: 100,
            solve_count: 0,
        })
        .collect();
    let mut seen = HashSet::new();
    let solves = raw
        .iter()
        .filter(|(team, chall, _)| seen.insert((*team, *chall)))
        .enumerate()
        .map(|(i, &(team, chall, at))| Solve {
            id: i as u64 + 1,
            user_id: 1,
            team_id: u64::from(team) + 1,
            challenge_id: u64::from(chall) + 1,
            solved_at: u64::from(at),
        })
        .collect();
    ScoreboardInput {
        teams,
        challenges,
        solves,
        awards: Vec::new(),
    }
}

proptest! {
    #[test]
    fn frozen_totals_ignore_post_freeze_solves(
        raw in prop::collection::vec((0u8..6, 0u8..3, 0u16..2_000), 0..18),
    ) {
        let full = random_input(&raw);
        let mut before = full.clone();
        before.solves.retain(|s| s.solved_at <= FREEZE_AT);

        let frozen = aggregate(&full, Some(FREEZE_AT), None);
        prop_assert_eq!(&frozen, &aggregate(&before, Some(FREEZE_AT), None));
        prop_assert_eq!(&frozen, &aggregate(&full, Some(FREEZE_AT), None));
        prop_assert!(frozen.windows(2).all(|w| w[0].points >= w[1].points));
    }
}
