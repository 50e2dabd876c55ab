//! Typed progress events for the broadcast collaborator.
//!
//! The core never calls the real-time layer directly: drivers and the session
//! runner publish [`Event`]s onto an unbounded channel through an
//! [`EventSink`], and whoever owns the receiving end consumes them on its own
//! schedule. Emission never blocks and never fails the game logic; a dropped
//! consumer just turns emission into a no-op.
//!
//! Each event carries enough data for a UI to rebuild its state without
//! re-deriving it from storage. Events serialize as internally tagged JSON
//! objects (`{"type": "move_completed", ...}`).

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use crate::game_record::GameStatus;
use crate::games::{BoardSnapshot, GameType, MoveAction};
use crate::session::Standing;

/// Progress events emitted by the evaluation core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A move driver started playing a game.
    GameStarted {
        /// Session the game belongs to, when run inside one.
        session: Option<Uuid>,
        /// Round number within the session, when run inside one.
        round: Option<u32>,
        /// Player the game was assigned to, when run inside one.
        player: Option<Uuid>,
        /// The game record id.
        game: Uuid,
        /// Which game is being played.
        game_type: GameType,
    },

    /// One move attempt finished (applied or refused).
    MoveCompleted {
        /// The game record id.
        game: Uuid,
        /// 1-based move number.
        move_number: u32,
        /// Action keyword, absent when the response did not parse.
        action: Option<MoveAction>,
        /// Whether the move was legal and applied.
        valid: bool,
        /// Board view after the attempt.
        board: BoardSnapshot,
    },

    /// A game reached a terminal or aborted state.
    GameCompleted {
        /// The game record id.
        game: Uuid,
        /// Final status (`won`, `lost` or `aborted`).
        status: GameStatus,
        /// Total attempts made.
        moves: u32,
        /// Final board view, when one was captured.
        board: Option<BoardSnapshot>,
    },

    /// All games of a round finished and scores were folded in.
    RoundCompleted {
        /// The session id.
        session: Uuid,
        /// 1-based round number.
        round: u32,
        /// Standings after this round.
        standings: Vec<Standing>,
    },

    /// The session ran its last round (or was cancelled) and is complete.
    CompetitionCompleted {
        /// The session id.
        session: Uuid,
        /// Immutable final standings.
        standings: Vec<Standing>,
    },

    /// A contained failure worth surfacing (agent outage, storage write...).
    Error {
        /// Session context, when available.
        session: Option<Uuid>,
        /// Game context, when available.
        game: Option<Uuid>,
        /// Human-readable description.
        message: String,
    },
}

/// Cloneable publishing half of the event channel.
///
/// `emit` is fire-and-forget: sending onto the unbounded channel cannot
/// block, and a hung-up receiver is silently ignored.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<Sender<Event>>,
}

impl EventSink {
    /// Create a connected sink/receiver pair.
    pub fn channel() -> (EventSink, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (EventSink { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything. Useful when no broadcast collaborator
    /// is attached (unit tests, one-off evaluations).
    pub fn disabled() -> EventSink {
        EventSink { tx: None }
    }

    /// Publish one event.
    pub fn emit(&self, event: Event) {
        trace!(?event, "emit");
        if let Some(tx) = &self.tx {
            // Receiver hung up: the collaborator is gone, not our problem.
            let _ = tx.send(event);
        }
    }
}
