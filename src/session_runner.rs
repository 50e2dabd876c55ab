//! Executes an active session: rounds in strict sequence, games within a
//! round in parallel.
//!
//! The runner owns the only shared mutable resources of the core (the
//! worker budget bounding concurrent games and the agent directory) and
//! drives everything else through exclusive ownership: each game gets its own
//! [`MoveDriver`] on its own thread, results come back over an `mpsc`
//! channel, and the next pending game launches as a slot frees up. Round
//! `N + 1` never starts before every game of round `N` reached a terminal or
//! aborted state.
//!
//! Failure policy: a player whose agent is unregistered, misconfigured or
//! permanently failing gets an aborted (worst-case-scored) record for the
//! round, and the session still runs to `Completed`. Only structural problems
//! (running a non-active session, an invalid scoring profile) surface as
//! errors, before any game starts.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agent_client::AgentDirectory;
use crate::configuration::{DriverLimits, SessionConfig};
use crate::errors::SessionStateError;
use crate::events::{Event, EventSink};
use crate::game_record::{GameRecord, GameStatus};
use crate::move_driver::{CancelToken, GameContext, MoveDriver};
use crate::scoring::{score_game, worst_case};
use crate::session::{RoundPlan, Session, SessionStatus, Standing};
use crate::storage::{MemoryStore, RecordStore};

/// Runs sessions to completion. See the module docs.
pub struct SessionRunner {
    config: SessionConfig,
    limits: DriverLimits,
    directory: AgentDirectory,
    events: EventSink,
    store: Arc<dyn RecordStore>,
    cancel: CancelToken,
}

struct GameJob {
    player: Uuid,
    agent_name: String,
    seed: Option<u64>,
}

impl SessionRunner {
    /// Runner with no broadcast sink and an in-memory store.
    pub fn new(config: SessionConfig, limits: DriverLimits, directory: AgentDirectory) -> Self {
        SessionRunner {
            config,
            limits,
            directory,
            events: EventSink::disabled(),
            store: Arc::new(MemoryStore::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Attach a broadcast sink.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Attach a storage collaborator.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// The host's cancellation lever: cancelling aborts in-flight games and
    /// skips remaining rounds, but the session still reaches `Completed` with
    /// whatever was recorded.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every round of an active session and return the final standings.
    ///
    /// # Errors
    /// [`SessionStateError`] when the session is not `Active`, or a
    /// [`ScoringError`](crate::errors::ScoringError) when a round's profile
    /// is invalid, both before any game starts. Per-game failures never
    /// error: they end up in the records.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub fn run(&self, session: &mut Session) -> anyhow::Result<Vec<Standing>> {
        if session.status() != SessionStatus::Active {
            return Err(SessionStateError::WrongStatus {
                expected: SessionStatus::Active,
                actual: session.status(),
            }
            .into());
        }
        // Profiles are checked before the first prompt goes out; a bad one
        // is the caller's bug, not a game failure.
        for round in session.rounds() {
            round.plan.profile.validate()?;
        }

        let round_count = session.rounds().len();
        for round_index in 0..round_count {
            if self.cancel.is_cancelled() {
                info!(round = round_index + 1, "cancelled, skipping remaining rounds");
                break;
            }
            self.run_round(session, round_index);
            self.events.emit(Event::RoundCompleted {
                session: session.id(),
                round: round_index as u32 + 1,
                standings: session.standings(),
            });
            self.save_snapshot(session);
        }

        session.complete();
        self.save_snapshot(session);
        let standings = session.standings();
        self.events.emit(Event::CompetitionCompleted {
            session: session.id(),
            standings: standings.clone(),
        });
        Ok(standings)
    }

    /// Play one round: every player's game independently, bounded by the
    /// concurrency budget, then fold in the scores.
    fn run_round(&self, session: &mut Session, round_index: usize) {
        let plan = session.rounds()[round_index].plan.clone();
        let round_number = round_index as u32 + 1;
        let deadline = plan.time_limit.map(|limit| Instant::now() + limit);
        info!(round = round_number, game = %plan.game.label(), "round starting");

        let mut pending: VecDeque<GameJob> = session
            .players()
            .iter()
            .enumerate()
            .map(|(i, p)| GameJob {
                player: p.id,
                agent_name: p.assigned_agent.clone(),
                // Distinct but reproducible board per player and round.
                seed: self
                    .config
                    .board_seed
                    .map(|s| s.wrapping_add(u64::from(round_number) * 1000 + i as u64)),
            })
            .collect();
        let total = pending.len();

        let (tx, rx) = mpsc::channel();
        for _ in 0..self.config.concurrency {
            match pending.pop_front() {
                Some(job) => self.launch_game(job, &plan, round_number, session.id(), deadline, &tx),
                None => break,
            }
        }

        let mut finished = Vec::with_capacity(total);
        while finished.len() < total {
            // Every launched game sends exactly once, so recv cannot starve.
            let (player, record) = rx.recv().expect("game worker vanished");
            if let Err(e) = self.store.save_game_record(&record) {
                warn!(error = %e, game = %record.id, "game record write failed");
                self.events.emit(Event::Error {
                    session: Some(session.id()),
                    game: Some(record.id),
                    message: format!("storage write failed: {e}"),
                });
            }
            finished.push((player, record));
            if let Some(job) = pending.pop_front() {
                self.launch_game(job, &plan, round_number, session.id(), deadline, &tx);
            }
        }

        for (player, record) in finished {
            let composite = match score_game(&record, &plan.profile) {
                Ok(score) => score.composite,
                // Profiles were validated up front; anything else still maps
                // to the defined worst case instead of wedging the session.
                Err(e) => {
                    warn!(error = %e, game = %record.id, "scoring failed, using worst case");
                    worst_case(&plan.profile).map(|s| s.composite).unwrap_or(0.0)
                }
            };
            session.absorb_game(round_index, player, record, composite);
        }
    }

    fn launch_game(
        &self,
        job: GameJob,
        plan: &RoundPlan,
        round_number: u32,
        session_id: Uuid,
        deadline: Option<Instant>,
        tx: &Sender<(Uuid, GameRecord)>,
    ) {
        let connector = match self.directory.get(&job.agent_name) {
            Some(c) => c,
            None => {
                warn!(agent = %job.agent_name, "agent not registered, recording aborted game");
                self.send_aborted(plan, &job, session_id, tx);
                return;
            }
        };
        let game = match plan.game.create(job.seed) {
            Ok(g) => g,
            Err(e) => {
                warn!(error = %e, "game creation failed, recording aborted game");
                self.send_aborted(plan, &job, session_id, tx);
                return;
            }
        };

        let mut driver = MoveDriver::new(game, plan.game.label(), connector, self.limits.clone())
            .with_events(self.events.clone())
            .with_cancel(self.cancel.clone())
            .with_context(GameContext {
                session: Some(session_id),
                round: Some(round_number),
                player: Some(job.player),
            });
        if let Some(deadline) = deadline {
            driver = driver.with_deadline(deadline);
        }

        let tx = tx.clone();
        let player = job.player;
        thread::spawn(move || {
            let record = driver.run();
            // Receiver gone means the runner is unwinding; nothing to do.
            let _ = tx.send((player, record));
        });
    }

    /// Stand-in record for a game that could not even start.
    fn send_aborted(
        &self,
        plan: &RoundPlan,
        job: &GameJob,
        session_id: Uuid,
        tx: &Sender<(Uuid, GameRecord)>,
    ) {
        self.events.emit(Event::Error {
            session: Some(session_id),
            game: None,
            message: format!("no playable game for agent `{}`", job.agent_name),
        });
        let mut record = GameRecord::open(plan.game.game_type(), plan.game.label());
        record.close(GameStatus::Aborted, None);
        let _ = tx.send((job.player, record));
    }

    fn save_snapshot(&self, session: &Session) {
        if let Err(e) = self.store.save_session_snapshot(session) {
            warn!(error = %e, "session snapshot write failed");
            self.events.emit(Event::Error {
                session: Some(session.id()),
                game: None,
                message: format!("storage write failed: {e}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::agent_client::{AgentConnector, AgentReply, MoveRequest};
    use crate::errors::AgentError;
    use crate::games::minesweeper::MinesweeperConfig;
    use crate::games::GameConfig;
    use crate::scoring::ScoringProfile;
    use crate::session::SessionFormat;

    /// Always answers `reveal 0 0`: one legal move, then illegal repeats
    /// until the error threshold aborts the game. Deterministic and fast.
    struct StubbornAgent;

    impl AgentConnector for StubbornAgent {
        fn request_move(&self, _request: &MoveRequest) -> Result<AgentReply, AgentError> {
            Ok(AgentReply::Text("reveal 0 0".into()))
        }
    }

    /// Simulates a provider outage.
    struct DeadAgent;

    impl AgentConnector for DeadAgent {
        fn request_move(&self, _request: &MoveRequest) -> Result<AgentReply, AgentError> {
            Err(AgentError::Provider("connection refused".into()))
        }
    }

    fn directory() -> AgentDirectory {
        let mut directory = AgentDirectory::new();
        directory.register("stubborn", Arc::new(StubbornAgent));
        directory.register("dead", Arc::new(DeadAgent));
        directory
    }

    fn fast_limits() -> DriverLimits {
        DriverLimits::builder()
            .with_agent_retries(0)
            .with_retry_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfig::builder()
            .with_min_players(2)
            .with_concurrency(2)
            .with_board_seed(7)
            .build()
            .unwrap()
    }

    fn plans(n: usize, profile: ScoringProfile) -> Vec<crate::session::RoundPlan> {
        (0..n)
            .map(|_| {
                RoundPlan::new(
                    GameConfig::Minesweeper(MinesweeperConfig::beginner()),
                    profile.clone(),
                )
            })
            .collect()
    }

    fn started_session(rounds: usize, agents: [&str; 2]) -> Session {
        let mut session =
            Session::create(SessionFormat::MultiRound, plans(rounds, ScoringProfile::balanced()))
                .unwrap();
        let host = session.join("host", agents[0]).unwrap();
        let guest = session.join("guest", agents[1]).unwrap();
        session.set_ready(guest, true).unwrap();
        session.start(host, &config()).unwrap();
        session
    }

    #[test]
    fn completes_even_when_one_agent_fails_every_round() {
        let mut session = started_session(3, ["stubborn", "dead"]);
        let runner = SessionRunner::new(config(), fast_limits(), directory());
        let standings = runner.run(&mut session).unwrap();

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(standings.len(), 2);
        // The failing player is still ranked, with the worst-case score.
        let dead = standings.iter().find(|s| s.agent == "dead").unwrap();
        assert_eq!(dead.score, 0.0);
        assert_eq!(dead.rank, 2);
        let alive = standings.iter().find(|s| s.agent == "stubborn").unwrap();
        assert!(alive.score > 0.0);

        // Every round holds a record for every player.
        for round in session.rounds() {
            assert_eq!(round.games.len(), 2);
            assert!(round.games.iter().all(|(_, r)| !r.in_progress()));
        }
    }

    #[test]
    fn unregistered_agents_get_worst_case_records() {
        let mut session = started_session(1, ["stubborn", "nonexistent"]);
        let runner = SessionRunner::new(config(), fast_limits(), directory());
        runner.run(&mut session).unwrap();

        let round = &session.rounds()[0];
        let (_, record) = round
            .games
            .iter()
            .find(|(_, r)| r.total_moves() == 0)
            .expect("the unregistered agent has an empty record");
        assert_eq!(record.status, GameStatus::Aborted);
    }

    #[test]
    fn refuses_sessions_that_are_not_active() {
        let mut session = Session::create(
            SessionFormat::SingleRound,
            plans(1, ScoringProfile::balanced()),
        )
        .unwrap();
        session.join("host", "stubborn").unwrap();
        let runner = SessionRunner::new(config(), fast_limits(), directory());
        let err = runner.run(&mut session).unwrap_err();
        assert!(err.downcast_ref::<SessionStateError>().is_some());
        assert_eq!(session.status(), SessionStatus::Waiting);
    }

    #[test]
    fn invalid_profiles_surface_before_any_game() {
        let broken = ScoringProfile::new("broken", [(crate::scoring::WIN_RATE, 0.9)]);
        let mut session = Session::create(SessionFormat::MultiRound, plans(1, broken)).unwrap();
        let host = session.join("host", "stubborn").unwrap();
        let guest = session.join("guest", "stubborn").unwrap();
        session.set_ready(guest, true).unwrap();
        session.start(host, &config()).unwrap();

        let store = Arc::new(MemoryStore::new());
        let runner = SessionRunner::new(config(), fast_limits(), directory())
            .with_store(store.clone());
        assert!(runner.run(&mut session).is_err());
        assert_eq!(store.game_count(), 0);
    }

    #[test]
    fn cancellation_still_reaches_completed() {
        let mut session = started_session(3, ["stubborn", "stubborn"]);
        let runner = SessionRunner::new(config(), fast_limits(), directory());
        runner.cancel_token().cancel();
        let standings = runner.run(&mut session).unwrap();

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(standings.len(), 2);
        assert!(session.rounds().iter().all(|r| r.games.is_empty()));
    }

    #[test]
    fn emits_round_and_competition_events_and_saves_records() {
        let (sink, rx) = EventSink::channel();
        let store = Arc::new(MemoryStore::new());
        let mut session = started_session(2, ["stubborn", "stubborn"]);
        let id = session.id();
        let runner = SessionRunner::new(config(), fast_limits(), directory())
            .with_events(sink)
            .with_store(store.clone());
        runner.run(&mut session).unwrap();

        let events: Vec<Event> = rx.try_iter().collect();
        let rounds = events
            .iter()
            .filter(|e| matches!(e, Event::RoundCompleted { .. }))
            .count();
        assert_eq!(rounds, 2);
        assert!(matches!(
            events.last(),
            Some(Event::CompetitionCompleted { session, standings })
                if *session == id && standings.len() == 2
        ));

        // 2 players x 2 rounds.
        assert_eq!(store.game_count(), 4);
        assert_eq!(
            store.session(id).unwrap().status(),
            SessionStatus::Completed
        );
    }
}
