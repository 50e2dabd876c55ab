//! Competition sessions: players, rounds, standings.
//!
//! A [`Session`] is a state machine `Waiting → Active → Completed`. While
//! waiting, players join (the first joiner is the host) and flag themselves
//! ready; only an explicit host action moves the session to `Active`, and
//! only when the configured minimum player count is met and every required
//! player is ready. Operations attempted in the wrong state fail with
//! [`SessionStateError`] and leave the session untouched.
//!
//! The session owns its rounds and players exclusively; game records are
//! folded in by the [`SessionRunner`](crate::session_runner::SessionRunner)
//! as rounds finish. Standings are derived on demand, never stored: higher
//! cumulative score first, ties broken by fewer total moves, then by earlier
//! completion.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::configuration::SessionConfig;
use crate::errors::{ConfigError, SessionStateError};
use crate::game_record::GameRecord;
use crate::games::GameConfig;
use crate::scoring::{RankKey, ScoringProfile};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Players are joining and readying up.
    Waiting,
    /// Rounds are running.
    Active,
    /// Final standings are frozen.
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Competition formats. All formats aggregate the same way (cumulative
/// composite across rounds); they differ only in how many rounds they admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFormat {
    /// Exactly one round.
    SingleRound,
    /// One or more rounds.
    MultiRound,
    /// Two or more rounds, with standings broadcast after every one.
    Tournament,
}

impl fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionFormat::SingleRound => "single_round",
            SessionFormat::MultiRound => "multi_round",
            SessionFormat::Tournament => "tournament",
        };
        write!(f, "{s}")
    }
}

/// What one round asks every player to play.
#[derive(Debug, Clone, Serialize)]
pub struct RoundPlan {
    /// Game type and difficulty, played once by each player.
    pub game: GameConfig,
    /// Profile used to score this round's games.
    pub profile: ScoringProfile,
    /// Wall-clock budget for the round; `None` means unlimited.
    pub time_limit: Option<Duration>,
}

impl RoundPlan {
    /// Plan without a time limit.
    pub fn new(game: GameConfig, profile: ScoringProfile) -> Self {
        RoundPlan {
            game,
            profile,
            time_limit: None,
        }
    }

    /// Sets the round's wall-clock budget.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// One executed (or pending) round.
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    /// 1-based round number.
    pub number: u32,
    /// The plan this round was created from.
    pub plan: RoundPlan,
    /// One record per player, filled in when the round finishes.
    pub games: Vec<(Uuid, GameRecord)>,
}

/// A participant and their running tally.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Stable id within the session.
    pub id: Uuid,
    /// Name shown in standings.
    pub display_name: String,
    /// Which registered agent plays for this participant.
    pub assigned_agent: String,
    /// Ready flag, set while the session is waiting.
    pub ready: bool,
    /// Sum of round composites so far.
    pub cumulative_score: f64,
    /// Total attempts across all finished games.
    pub total_moves: u32,
    /// When this player's latest game closed.
    pub last_finished: Option<DateTime<Utc>>,
}

/// One row of the derived standings.
#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    /// 1-based rank.
    pub rank: u32,
    /// Player id.
    pub player: Uuid,
    /// Player display name.
    pub display_name: String,
    /// Agent playing for them.
    pub agent: String,
    /// Cumulative score.
    pub score: f64,
    /// Total moves, the first tie-breaker.
    pub total_moves: u32,
}

/// A competition instance. See the module docs.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) join_code: String,
    pub(crate) format: SessionFormat,
    pub(crate) status: SessionStatus,
    pub(crate) host: Option<Uuid>,
    pub(crate) players: Vec<Player>,
    pub(crate) rounds: Vec<Round>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Session {
    /// Create a waiting session from round plans.
    ///
    /// # Errors
    /// [`ConfigError`] when the plan count does not fit the format or a game
    /// config is inconsistent.
    pub fn create(format: SessionFormat, plans: Vec<RoundPlan>) -> Result<Self, ConfigError> {
        let admissible = match format {
            SessionFormat::SingleRound => plans.len() == 1,
            SessionFormat::MultiRound => !plans.is_empty(),
            SessionFormat::Tournament => plans.len() >= 2,
        };
        if !admissible {
            return Err(ConfigError::BadRoundCount {
                format: format.to_string(),
                rounds: plans.len(),
            });
        }
        for plan in &plans {
            plan.game.validate()?;
        }

        let session = Session {
            id: Uuid::new_v4(),
            join_code: generate_join_code(),
            format,
            status: SessionStatus::Waiting,
            host: None,
            players: Vec::new(),
            rounds: plans
                .into_iter()
                .enumerate()
                .map(|(i, plan)| Round {
                    number: i as u32 + 1,
                    plan,
                    games: Vec::new(),
                })
                .collect(),
            created_at: Utc::now(),
        };
        info!(session = %session.id, code = %session.join_code, %format, "session created");
        Ok(session)
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Code players use to join through whatever front door exists.
    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The host player, once somebody joined.
    pub fn host(&self) -> Option<Uuid> {
        self.host
    }

    /// Participants, in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Rounds, in play order.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Add a player. The first joiner becomes the host.
    ///
    /// # Errors
    /// [`SessionStateError::WrongStatus`] unless the session is waiting.
    pub fn join(
        &mut self,
        display_name: impl Into<String>,
        assigned_agent: impl Into<String>,
    ) -> Result<Uuid, SessionStateError> {
        self.require_status(SessionStatus::Waiting)?;
        let player = Player {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            assigned_agent: assigned_agent.into(),
            ready: false,
            cumulative_score: 0.0,
            total_moves: 0,
            last_finished: None,
        };
        let id = player.id;
        if self.host.is_none() {
            self.host = Some(id);
        }
        info!(session = %self.id, player = %id, name = %player.display_name, "player joined");
        self.players.push(player);
        Ok(id)
    }

    /// Set a player's ready flag.
    ///
    /// # Errors
    /// [`SessionStateError`] when the session is not waiting or the player
    /// is unknown.
    pub fn set_ready(&mut self, player: Uuid, ready: bool) -> Result<(), SessionStateError> {
        self.require_status(SessionStatus::Waiting)?;
        self.player_mut(player)?.ready = ready;
        Ok(())
    }

    /// Host action: move the session from `Waiting` to `Active`.
    ///
    /// Never triggered automatically. Requires at least `config.min_players`
    /// joined and every player ready, except the host itself when
    /// `config.host_ready_exempt` is set.
    ///
    /// # Errors
    /// [`SessionStateError`] describing the first unmet requirement; the
    /// session stays in `Waiting`.
    pub fn start(&mut self, by: Uuid, config: &SessionConfig) -> Result<(), SessionStateError> {
        self.require_status(SessionStatus::Waiting)?;
        self.player_mut(by)?;
        if self.host != Some(by) {
            return Err(SessionStateError::NotHost("start the session"));
        }
        if self.players.len() < config.min_players {
            return Err(SessionStateError::NotEnoughPlayers {
                count: self.players.len(),
                min: config.min_players,
            });
        }
        let required: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| !(config.host_ready_exempt && Some(p.id) == self.host))
            .collect();
        let ready = required.iter().filter(|p| p.ready).count();
        if ready < required.len() {
            return Err(SessionStateError::PlayersNotReady {
                ready,
                required: required.len(),
            });
        }
        self.status = SessionStatus::Active;
        info!(session = %self.id, players = self.players.len(), "session started");
        Ok(())
    }

    /// Current standings: cumulative score desc, then fewer moves, then
    /// earlier completion. Derived, never stored.
    pub fn standings(&self) -> Vec<Standing> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| rank_key(a).compare(&rank_key(b)));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| Standing {
                rank: i as u32 + 1,
                player: p.id,
                display_name: p.display_name.clone(),
                agent: p.assigned_agent.clone(),
                score: p.cumulative_score,
                total_moves: p.total_moves,
            })
            .collect()
    }

    /// Fold one finished game into the round and its player's tally.
    pub(crate) fn absorb_game(
        &mut self,
        round_index: usize,
        player: Uuid,
        record: GameRecord,
        round_score: f64,
    ) {
        if let Ok(p) = self.player_mut(player) {
            p.cumulative_score += round_score;
            p.total_moves += record.total_moves();
            p.last_finished = record.ended_at.or(p.last_finished);
        }
        self.rounds[round_index].games.push((player, record));
    }

    /// Freeze the session. Idempotent; only meaningful from `Active`.
    pub(crate) fn complete(&mut self) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Completed;
            info!(session = %self.id, "session completed");
        }
    }

    fn require_status(&self, expected: SessionStatus) -> Result<(), SessionStateError> {
        if self.status != expected {
            return Err(SessionStateError::WrongStatus {
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    fn player_mut(&mut self, id: Uuid) -> Result<&mut Player, SessionStateError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SessionStateError::UnknownPlayer(id))
    }
}

fn rank_key(p: &Player) -> RankKey {
    RankKey {
        score: p.cumulative_score,
        moves: p.total_moves,
        // Players that never finished anything sort behind everyone on ties.
        finished_at: p.last_finished.unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

fn generate_join_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::minesweeper::MinesweeperConfig;

    fn one_round() -> Vec<RoundPlan> {
        vec![RoundPlan::new(
            GameConfig::Minesweeper(MinesweeperConfig::beginner()),
            ScoringProfile::balanced(),
        )]
    }

    fn waiting_session() -> Session {
        Session::create(SessionFormat::SingleRound, one_round()).unwrap()
    }

    fn config(min_players: usize) -> SessionConfig {
        SessionConfig::builder()
            .with_min_players(min_players)
            .build()
            .unwrap()
    }

    #[test]
    fn create_checks_format_against_round_count() {
        assert!(matches!(
            Session::create(SessionFormat::SingleRound, vec![]),
            Err(ConfigError::BadRoundCount { .. })
        ));
        let two = || {
            let mut p = one_round();
            p.extend(one_round());
            p
        };
        assert!(Session::create(SessionFormat::SingleRound, two()).is_err());
        assert!(Session::create(SessionFormat::Tournament, one_round()).is_err());
        assert!(Session::create(SessionFormat::Tournament, two()).is_ok());
        assert!(Session::create(SessionFormat::MultiRound, one_round()).is_ok());
    }

    #[test]
    fn join_codes_look_usable() {
        let session = waiting_session();
        assert_eq!(session.join_code().len(), 6);
        assert!(session.join_code().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn first_joiner_is_the_host() {
        let mut session = waiting_session();
        let alice = session.join("alice", "model-a").unwrap();
        let bob = session.join("bob", "model-b").unwrap();
        assert_eq!(session.host(), Some(alice));
        assert_ne!(alice, bob);
    }

    #[test]
    fn start_requires_host_minimum_and_readiness() {
        let mut session = waiting_session();
        let host = session.join("host", "model-a").unwrap();

        assert!(matches!(
            session.start(host, &config(2)),
            Err(SessionStateError::NotEnoughPlayers { count: 1, min: 2 })
        ));

        let guest = session.join("guest", "model-b").unwrap();
        assert!(matches!(
            session.start(guest, &config(2)),
            Err(SessionStateError::NotHost(_))
        ));
        assert!(matches!(
            session.start(host, &config(2)),
            Err(SessionStateError::PlayersNotReady { ready: 0, required: 1 })
        ));

        session.set_ready(guest, true).unwrap();
        session.start(host, &config(2)).unwrap();
        assert_eq!(session.status(), SessionStatus::Active);

        // Already active: everything but completion is now invalid.
        assert!(matches!(
            session.start(host, &config(2)),
            Err(SessionStateError::WrongStatus { .. })
        ));
        assert!(session.join("late", "model-c").is_err());
        assert!(session.set_ready(guest, false).is_err());
    }

    #[test]
    fn host_ready_exemption_is_configurable() {
        let strict = SessionConfig::builder()
            .with_min_players(1)
            .with_host_ready_exempt(false)
            .build()
            .unwrap();
        let mut session = waiting_session();
        let host = session.join("host", "model-a").unwrap();
        assert!(matches!(
            session.start(host, &strict),
            Err(SessionStateError::PlayersNotReady { .. })
        ));
        session.set_ready(host, true).unwrap();
        session.start(host, &strict).unwrap();
    }

    #[test]
    fn unknown_players_are_rejected() {
        let mut session = waiting_session();
        session.join("host", "model-a").unwrap();
        let stranger = Uuid::new_v4();
        assert!(matches!(
            session.set_ready(stranger, true),
            Err(SessionStateError::UnknownPlayer(id)) if id == stranger
        ));
    }

    #[test]
    fn standings_sort_by_score_then_moves_then_time() {
        let mut session = waiting_session();
        let a = session.join("a", "model-a").unwrap();
        let b = session.join("b", "model-b").unwrap();
        let c = session.join("c", "model-c").unwrap();

        let now = Utc::now();
        for (id, score, moves, offset) in [(a, 0.75, 30, 0), (b, 0.75, 20, 10), (c, 0.75, 20, 5)] {
            let p = session.player_mut(id).unwrap();
            p.cumulative_score = score;
            p.total_moves = moves;
            p.last_finished = Some(now + chrono::Duration::seconds(offset));
        }

        let standings = session.standings();
        // Equal scores: fewer moves first; equal moves: earlier finish first.
        assert_eq!(standings[0].player, c);
        assert_eq!(standings[1].player, b);
        assert_eq!(standings[2].player, a);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[2].rank, 3);
    }
}
