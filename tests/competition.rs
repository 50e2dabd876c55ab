//! End-to-end competition runs with scripted agents standing in for model
//! providers.

use std::sync::Arc;
use std::time::Duration;

use ai_gauntlet::prelude::*;
use ai_gauntlet::storage::LeaderboardFilter;

use crate::agents::{BoardScanner, Conqueror, Mute};

mod agents;

fn directory() -> AgentDirectory {
    let mut agents = AgentDirectory::new();
    agents.register("scanner", Arc::new(BoardScanner));
    agents.register("conqueror", Arc::new(Conqueror));
    agents.register("mute", Arc::new(Mute));
    agents
}

fn limits() -> DriverLimits {
    DriverLimits::builder()
        .with_max_moves(100)
        .with_agent_retries(0)
        .with_retry_backoff(Duration::from_millis(1))
        .build()
        .unwrap()
}

fn config() -> SessionConfig {
    SessionConfig::builder()
        .with_min_players(2)
        .with_concurrency(2)
        .with_board_seed(2024)
        .build()
        .unwrap()
}

fn mixed_plans() -> Vec<RoundPlan> {
    vec![
        RoundPlan::new(
            GameConfig::Minesweeper(MinesweeperConfig::beginner()),
            ScoringProfile::balanced(),
        ),
        RoundPlan::new(
            GameConfig::Risk(RiskConfig::skirmish()),
            ScoringProfile::accuracy_focused(),
        )
        .with_time_limit(Duration::from_secs(60)),
    ]
}

#[test]
fn two_agents_play_a_mixed_competition() {
    let mut session = Session::create(SessionFormat::MultiRound, mixed_plans()).unwrap();
    let host = session.join("alice", "scanner").unwrap();
    let bob = session.join("bob", "conqueror").unwrap();
    session.set_ready(bob, true).unwrap();
    session.start(host, &config()).unwrap();

    let (sink, rx) = EventSink::channel();
    let store = Arc::new(MemoryStore::new());
    let runner = SessionRunner::new(config(), limits(), directory())
        .with_events(sink)
        .with_store(store.clone());

    let standings = runner.run(&mut session).unwrap();

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(standings.len(), 2);
    for round in session.rounds() {
        assert_eq!(round.games.len(), 2);
        for (_, record) in &round.games {
            assert!(!record.in_progress());
            assert!(record.ended_at.is_some());
        }
    }

    // 2 players x 2 rounds, every record persisted.
    assert_eq!(store.game_count(), 4);

    let events: Vec<Event> = rx.try_iter().collect();
    let started = events
        .iter()
        .filter(|e| matches!(e, Event::GameStarted { .. }))
        .count();
    assert_eq!(started, 4);
    let rounds_completed = events
        .iter()
        .filter(|e| matches!(e, Event::RoundCompleted { .. }))
        .count();
    assert_eq!(rounds_completed, 2);
    assert!(matches!(
        events.last(),
        Some(Event::CompetitionCompleted { .. })
    ));
}

#[test]
fn an_unreachable_provider_never_blocks_the_competition() {
    let mut session = Session::create(
        SessionFormat::Tournament,
        vec![
            RoundPlan::new(
                GameConfig::Minesweeper(MinesweeperConfig::beginner()),
                ScoringProfile::balanced(),
            ),
            RoundPlan::new(
                GameConfig::Minesweeper(MinesweeperConfig::intermediate()),
                ScoringProfile::balanced(),
            ),
            RoundPlan::new(
                GameConfig::Minesweeper(MinesweeperConfig::beginner()),
                ScoringProfile::balanced(),
            ),
        ],
    )
    .unwrap();
    let host = session.join("alive", "scanner").unwrap();
    let ghost = session.join("ghost", "mute").unwrap();
    session.set_ready(ghost, true).unwrap();
    session.start(host, &config()).unwrap();

    let runner = SessionRunner::new(config(), limits(), directory());
    let standings = runner.run(&mut session).unwrap();

    assert_eq!(standings.len(), 2);
    let ghost_row = standings.iter().find(|s| s.agent == "mute").unwrap();
    assert_eq!(ghost_row.score, 0.0);
    assert_eq!(ghost_row.total_moves, 0);

    // Every one of the ghost's games aborted, none is missing.
    let ghost_games: Vec<_> = session
        .rounds()
        .iter()
        .flat_map(|r| r.games.iter())
        .filter(|(player, _)| *player == ghost)
        .collect();
    assert_eq!(ghost_games.len(), 3);
    assert!(ghost_games
        .iter()
        .all(|(_, r)| r.status == GameStatus::Aborted));
}

#[test]
fn leaderboard_reflects_a_finished_competition() {
    let mut session = Session::create(
        SessionFormat::SingleRound,
        vec![RoundPlan::new(
            GameConfig::Minesweeper(MinesweeperConfig::beginner()),
            ScoringProfile::balanced(),
        )],
    )
    .unwrap();
    let host = session.join("alice", "scanner").unwrap();
    let ghost = session.join("ghost", "mute").unwrap();
    session.set_ready(ghost, true).unwrap();
    session.start(host, &config()).unwrap();

    let store = Arc::new(MemoryStore::new());
    let runner = SessionRunner::new(config(), limits(), directory()).with_store(store.clone());
    runner.run(&mut session).unwrap();

    let board = store
        .read_leaderboard(&LeaderboardFilter {
            game_type: Some(GameType::Minesweeper),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].display_name, "alice");
    assert!(board[0].score >= board[1].score);
}

#[test]
fn first_reveal_on_a_zero_cell_floods_the_neighborhood() {
    // Uniform placement means some seeds put a mine under the first click;
    // scan for one where (0,0) is a zero cell and check the flood.
    let config = GameConfig::Minesweeper(MinesweeperConfig::beginner());
    for seed in 0..200u64 {
        let mut game = config.create(Some(seed)).unwrap();
        let mv = game.parse_move("reveal 0 0").unwrap();
        game.apply_move(&mv);
        let snapshot = game.snapshot();
        let corner = snapshot.rows[0].chars().next().unwrap();
        if corner != '.' {
            continue;
        }
        let revealed: usize = snapshot
            .rows
            .iter()
            .map(|row| row.chars().filter(|&c| c != '#').count())
            .sum();
        assert!(revealed > 1, "zero cell must flood, got {revealed}");
        assert!(!game.is_terminal());
        assert!(snapshot.progress > 1.0 / 71.0);
        return;
    }
    panic!("no seed in 0..200 put a zero cell at the corner");
}
