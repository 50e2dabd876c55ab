//! Persistent history of one played game.
//!
//! A [`GameRecord`] is created when a round assigns a player to a game, is
//! mutated only by the move driver that owns it, and becomes immutable once
//! its status leaves [`GameStatus::InProgress`]: the closing guards here make
//! a second close (or a late move) a no-op rather than a corruption.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::games::{BoardSnapshot, GameType, Move};

/// Lifecycle of a game record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// The driver is still playing this game.
    InProgress,
    /// Winning condition met.
    Won,
    /// Losing condition met.
    Lost,
    /// Driver gave up: error threshold, move limit, deadline or cancellation.
    /// Deliberately distinct from `Lost`.
    Aborted,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GameStatus::InProgress => "in_progress",
            GameStatus::Won => "won",
            GameStatus::Lost => "lost",
            GameStatus::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// One agent response, valid or not, as it was played.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedMove {
    /// 1-based position in the game.
    pub number: u32,
    /// The raw agent response this attempt came from.
    pub raw: String,
    /// The parsed move, when parsing succeeded.
    pub parsed: Option<Move>,
    /// Whether the move was legal and applied.
    pub valid: bool,
    /// Parse or rejection detail for invalid attempts.
    pub detail: Option<String>,
    /// When the attempt was applied (or refused).
    pub at: DateTime<Utc>,
}

/// History of one game instance: every attempt the agent made, in order,
/// plus the final status and board.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    /// Unique id of this play-through.
    pub id: Uuid,
    /// Which game was played.
    pub game_type: GameType,
    /// Difficulty label, from [`GameConfig::label`](crate::games::GameConfig::label).
    pub difficulty: String,
    /// Every attempt, strictly ordered by application time.
    pub moves: Vec<RecordedMove>,
    /// Current lifecycle state.
    pub status: GameStatus,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the record closes.
    pub ended_at: Option<DateTime<Utc>>,
    /// Board view at close time, used for display and coverage scoring.
    pub final_board: Option<BoardSnapshot>,
}

impl GameRecord {
    /// Open a fresh in-progress record.
    pub fn open(game_type: GameType, difficulty: impl Into<String>) -> Self {
        GameRecord {
            id: Uuid::new_v4(),
            game_type,
            difficulty: difficulty.into(),
            moves: Vec::new(),
            status: GameStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
            final_board: None,
        }
    }

    /// True until the record is closed.
    pub fn in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }

    /// Append one attempt. Ignored (with a warning) on a closed record.
    pub(crate) fn push_move(
        &mut self,
        raw: String,
        parsed: Option<Move>,
        valid: bool,
        detail: Option<String>,
    ) -> u32 {
        if !self.in_progress() {
            warn!(record = %self.id, "dropping move pushed to a closed record");
            return self.moves.len() as u32;
        }
        let number = self.moves.len() as u32 + 1;
        self.moves.push(RecordedMove {
            number,
            raw,
            parsed,
            valid,
            detail,
            at: Utc::now(),
        });
        number
    }

    /// Close the record with a final status and board. A second close is a
    /// no-op: terminal records never change status.
    pub(crate) fn close(&mut self, status: GameStatus, board: Option<BoardSnapshot>) {
        if !self.in_progress() {
            warn!(record = %self.id, ?status, "ignoring close of an already closed record");
            return;
        }
        debug_assert!(status != GameStatus::InProgress);
        self.status = status;
        self.ended_at = Some(Utc::now());
        self.final_board = board;
    }

    /// Number of attempts, valid or not.
    pub fn total_moves(&self) -> u32 {
        self.moves.len() as u32
    }

    /// Number of legal, applied moves.
    pub fn valid_moves(&self) -> u32 {
        self.moves.iter().filter(|m| m.valid).count() as u32
    }

    /// Wall-clock duration from open to close, if closed.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}
