//! Error taxonomy of the evaluation core.
//!
//! Errors are split by blast radius:
//!
//! - [`ConfigError`] and [`SessionStateError`] are structural. They surface
//!   synchronously to the caller and never produce a [`GameRecord`](crate::game_record::GameRecord).
//! - [`MoveParseError`] and illegal-move rejections are contained at the game
//!   level: they are recorded as failed moves and retried up to the
//!   consecutive-error threshold.
//! - [`AgentError`] is retryable with backoff; exhausting retries aborts the
//!   current game only, never the session.
//! - [`ScoringError`] is surfaced immediately; an invalid profile is never
//!   silently corrected.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionStatus;

/// Invalid game or session configuration. Fails fast, before any game exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Board dimensions must both be positive.
    #[error("board dimensions must be positive, got {width}x{height}")]
    EmptyBoard {
        /// Configured width.
        width: usize,
        /// Configured height.
        height: usize,
    },

    /// Mine count must be positive and strictly below the cell count.
    #[error("mine count {mines} is not in 1..{cells} (cells)")]
    BadMineCount {
        /// Configured number of mines.
        mines: usize,
        /// Total number of cells on the board.
        cells: usize,
    },

    /// A map needs at least two territories to fight over.
    #[error("territory count {0} is below the minimum of 2")]
    BadTerritoryCount(usize),

    /// Army counts must be positive.
    #[error("{role} army count must be positive")]
    BadArmyCount {
        /// Which army count was rejected ("reserve" or "garrison").
        role: &'static str,
    },

    /// Round plans are inconsistent with the session format.
    #[error("format `{format}` does not admit {rounds} round(s)")]
    BadRoundCount {
        /// The configured session format, as displayed.
        format: String,
        /// Number of round plans supplied.
        rounds: usize,
    },

    /// Catch-all for other inconsistent settings.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The agent response could not be parsed into a candidate move.
///
/// Distinct from an *illegal* move: a malformed response never reaches the
/// rules engine at all. Both count toward the consecutive-error threshold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    /// The response contained no tokens.
    #[error("empty response")]
    Empty,

    /// The leading token is not an action of the game being played.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// Wrong number of arguments for the recognized action.
    #[error("`{action}` takes {expected} argument(s), got {found}")]
    WrongArity {
        /// The recognized action keyword.
        action: &'static str,
        /// Number of arguments the grammar requires.
        expected: usize,
        /// Number of arguments found in the response.
        found: usize,
    },

    /// An argument that must be numeric was not.
    #[error("`{0}` is not a number")]
    BadNumber(String),
}

/// Failure while obtaining a move from the agent provider.
///
/// Both variants are retryable with backoff up to the configured retry count;
/// past that the driver aborts the game (status `aborted`, not `lost`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// No response within the per-move timeout.
    #[error("agent response timed out after {0:?}")]
    Timeout(Duration),

    /// The provider failed outright (connection refused, rate limit, 5xx...).
    #[error("agent provider error: {0}")]
    Provider(String),
}

/// Scoring rejected the inputs it was given.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// Profile weights do not sum to 1.0 (within epsilon). The engine never
    /// renormalizes on the caller's behalf.
    #[error("profile `{name}` weights sum to {sum}, expected 1.0")]
    InvalidProfile {
        /// Name of the offending profile.
        name: String,
        /// Actual weight sum.
        sum: f64,
    },

    /// The profile references a component no metric produces.
    #[error("profile `{profile}` references unknown component `{component}`")]
    UnknownComponent {
        /// Name of the offending profile.
        profile: String,
        /// The unrecognized component id.
        component: String,
    },
}

/// An operation was attempted in the wrong session state. The session is
/// left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionStateError {
    /// The session is not in the status the operation requires.
    #[error("session is {actual}, operation requires {expected}")]
    WrongStatus {
        /// Status the operation requires.
        expected: SessionStatus,
        /// Status the session is actually in.
        actual: SessionStatus,
    },

    /// Only the host may perform this action.
    #[error("only the host may {0}")]
    NotHost(&'static str),

    /// Fewer players than the configured minimum have joined.
    #[error("{count} player(s) joined, {min} required")]
    NotEnoughPlayers {
        /// Players currently joined.
        count: usize,
        /// Configured minimum.
        min: usize,
    },

    /// Some required players are not ready yet.
    #[error("{ready}/{required} required players ready")]
    PlayersNotReady {
        /// Players currently ready.
        ready: usize,
        /// Players that must be ready before starting.
        required: usize,
    },

    /// No player with this id belongs to the session.
    #[error("unknown player {0}")]
    UnknownPlayer(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let e = ConfigError::BadMineCount {
            mines: 99,
            cells: 81,
        };
        assert!(e.to_string().contains("99"));
        assert!(e.to_string().contains("81"));

        let e = MoveParseError::WrongArity {
            action: "reveal",
            expected: 2,
            found: 3,
        };
        assert!(e.to_string().contains("reveal"));

        let e = ScoringError::InvalidProfile {
            name: "speed".into(),
            sum: 0.9,
        };
        assert!(e.to_string().contains("0.9"));
    }
}
