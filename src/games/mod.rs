//! Game engines and the capability interface they share.
//!
//! Each supported game implements [`Game`]: pure rule simulation with a fixed
//! move grammar, selected at runtime through [`GameType`] and constructed from
//! a validated [`GameConfig`]. The engines know nothing about agents, scoring
//! or sessions; they accept a candidate [`Move`], answer with a
//! [`MoveOutcome`], and can render themselves for an agent prompt or a UI
//! snapshot.
//!
//! Two invariants hold for every engine:
//!
//! - A rejected move never mutates state.
//! - Once a game is terminal, every further move is rejected.

pub mod minesweeper;
pub mod risk;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, MoveParseError};

pub use minesweeper::Minesweeper;
pub use risk::Risk;

/// The games the evaluator can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Single-player mine sweeping on a rectangular grid.
    Minesweeper,
    /// Single-agent territory conquest against neutral garrisons.
    Risk,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Minesweeper => write!(f, "minesweeper"),
            GameType::Risk => write!(f, "risk"),
        }
    }
}

/// Move keywords across all games. Each engine accepts its own subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveAction {
    /// Minesweeper: uncover a cell.
    Reveal,
    /// Minesweeper: mark a cell as a suspected mine.
    Flag,
    /// Minesweeper: remove a flag.
    Unflag,
    /// Risk: move reserve armies onto an owned territory.
    Deploy,
    /// Risk: attack an adjacent enemy territory.
    Attack,
    /// Risk: decline to act this turn.
    Pass,
}

impl fmt::Display for MoveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MoveAction::Reveal => "reveal",
            MoveAction::Flag => "flag",
            MoveAction::Unflag => "unflag",
            MoveAction::Deploy => "deploy",
            MoveAction::Attack => "attack",
            MoveAction::Pass => "pass",
        };
        write!(f, "{s}")
    }
}

/// What a move acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveTarget {
    /// A grid cell, row-major from the top-left corner.
    Cell {
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
    /// Reinforcement of one territory from the reserve.
    Garrison {
        /// Territory receiving the armies.
        territory: usize,
        /// Number of armies moved out of the reserve.
        armies: u32,
    },
    /// An attack from one territory into another.
    Assault {
        /// Attacking territory (must be owned).
        from: usize,
        /// Defending territory (must be adjacent and enemy).
        to: usize,
    },
    /// No target (e.g. `pass`).
    None,
}

/// One candidate move. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// The action keyword.
    pub action: MoveAction,
    /// What the action applies to.
    pub target: MoveTarget,
    /// Free-text reasoning the agent attached, if any. Carried verbatim for
    /// later analysis, never interpreted.
    pub rationale: Option<String>,
}

impl Move {
    /// Move without a rationale.
    pub fn new(action: MoveAction, target: MoveTarget) -> Self {
        Move {
            action,
            target,
            rationale: None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            MoveTarget::Cell { row, col } => write!(f, "{} {row} {col}", self.action),
            MoveTarget::Garrison { territory, armies } => {
                write!(f, "{} {territory} {armies}", self.action)
            }
            MoveTarget::Assault { from, to } => write!(f, "{} {from} {to}", self.action),
            MoveTarget::None => write!(f, "{}", self.action),
        }
    }
}

/// Why a parsed move was refused by the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Coordinates or territory id outside the board.
    OutOfBounds,
    /// The cell is already revealed.
    AlreadyRevealed,
    /// The cell is already flagged.
    AlreadyFlagged,
    /// `unflag` on a cell that carries no flag.
    NotFlagged,
    /// The game already reached a terminal state.
    GameFinished,
    /// The action keyword does not belong to this game.
    ForeignAction,
    /// The territory is not owned by the agent.
    NotOwned,
    /// The attacked territory is not an enemy territory.
    NotEnemy,
    /// The two territories do not share a border.
    NotAdjacent,
    /// An attack needs at least two armies on the source territory.
    InsufficientArmies,
    /// Deploying more armies than the reserve holds (or zero).
    BadReserveDraw,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::OutOfBounds => "target is out of bounds",
            RejectReason::AlreadyRevealed => "cell is already revealed",
            RejectReason::AlreadyFlagged => "cell is already flagged",
            RejectReason::NotFlagged => "cell is not flagged",
            RejectReason::GameFinished => "game is already finished",
            RejectReason::ForeignAction => "action does not belong to this game",
            RejectReason::NotOwned => "territory is not owned",
            RejectReason::NotEnemy => "territory is not an enemy territory",
            RejectReason::NotAdjacent => "territories are not adjacent",
            RejectReason::InsufficientArmies => "attacking needs at least two armies",
            RejectReason::BadReserveDraw => "reserve does not hold that many armies",
        };
        write!(f, "{s}")
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    /// The winning condition was met.
    Won,
    /// The losing condition was met (mine hit, conquest impossible...).
    Lost,
}

/// Result of applying one move.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// Legal move, applied; the game continues.
    Accepted,
    /// Illegal move; state untouched.
    Rejected(RejectReason),
    /// Legal move, applied, and it ended the game.
    Terminal(GameOutcome),
}

/// Serializable view of a board for display. Carries no game logic; the
/// `progress` figure is the fraction of the winning condition already met,
/// which scoring reuses as board coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Which game this is a view of.
    pub game_type: GameType,
    /// Human-readable board, one string per row/territory.
    pub rows: Vec<String>,
    /// Fraction of the winning condition achieved, in `[0, 1]`.
    pub progress: f64,
}

/// Capability interface implemented once per [`GameType`].
///
/// `Send` so a running game can live on a worker thread.
pub trait Game: Send {
    /// Which game this engine plays.
    fn game_type(&self) -> GameType;

    /// Parse a free-text agent response against this game's grammar.
    ///
    /// # Errors
    /// [`MoveParseError`] when the text is malformed. Semantic legality is
    /// *not* checked here; that is [`apply_move`](Game::apply_move)'s job, so
    /// the driver can tell malformed from illegal.
    fn parse_move(&self, text: &str) -> Result<Move, MoveParseError>;

    /// Apply a candidate move.
    ///
    /// Rejected moves leave the state exactly as it was. Moves against a
    /// terminal game are always rejected with [`RejectReason::GameFinished`].
    fn apply_move(&mut self, mv: &Move) -> MoveOutcome;

    /// True once a terminal state has been reached.
    fn is_terminal(&self) -> bool;

    /// The final outcome, once terminal.
    fn outcome(&self) -> Option<GameOutcome>;

    /// Agent-facing rendering of the current state.
    ///
    /// Must be a pure function of the state: the same state always renders to
    /// the same bytes.
    fn render_state(&self) -> String;

    /// Description of the legal-action grammar, sent alongside the state.
    fn move_grammar(&self) -> String;

    /// Display snapshot of the current state.
    fn snapshot(&self) -> BoardSnapshot;
}

/// A validated game configuration: the game type plus its difficulty preset.
///
/// Construction goes through the per-game config types, which enforce the
/// internal consistency rules; [`GameConfig::create`] then builds a fresh
/// engine, optionally from a fixed seed for reproducible boards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameConfig {
    /// Minesweeper board settings.
    Minesweeper(minesweeper::MinesweeperConfig),
    /// Risk map settings.
    Risk(risk::RiskConfig),
}

impl GameConfig {
    /// The game this config describes.
    pub fn game_type(&self) -> GameType {
        match self {
            GameConfig::Minesweeper(_) => GameType::Minesweeper,
            GameConfig::Risk(_) => GameType::Risk,
        }
    }

    /// Re-check the internal consistency rules.
    ///
    /// Configs built through the typed constructors are already valid; this
    /// exists for configs deserialized from external sources.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            GameConfig::Minesweeper(c) => c.validate(),
            GameConfig::Risk(c) => c.validate(),
        }
    }

    /// Short label used as the difficulty field of game records
    /// (e.g. `minesweeper-9x9-10`).
    pub fn label(&self) -> String {
        match self {
            GameConfig::Minesweeper(c) => {
                format!("minesweeper-{}x{}-{}", c.width, c.height, c.mines)
            }
            GameConfig::Risk(c) => format!("risk-{}t-{}r", c.territories, c.reserve),
        }
    }

    /// Build a fresh engine instance.
    ///
    /// `seed` fixes the board layout (mine placement, combat dice); `None`
    /// draws one from OS entropy.
    ///
    /// # Errors
    /// [`ConfigError`] when the config is internally inconsistent.
    pub fn create(&self, seed: Option<u64>) -> Result<Box<dyn Game>, ConfigError> {
        self.validate()?;
        Ok(match self {
            GameConfig::Minesweeper(c) => Box::new(Minesweeper::new(c.clone(), seed)),
            GameConfig::Risk(c) => Box::new(Risk::new(c.clone(), seed)),
        })
    }
}

/// Split `text` into whitespace tokens, used by every engine's parser.
pub(crate) fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Parse a numeric argument, mapping failure to the grammar error.
pub(crate) fn parse_num<T: std::str::FromStr>(token: &str) -> Result<T, MoveParseError> {
    token
        .parse()
        .map_err(|_| MoveParseError::BadNumber(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_labels_carry_difficulty() {
        let ms = GameConfig::Minesweeper(minesweeper::MinesweeperConfig::beginner());
        assert_eq!(ms.label(), "minesweeper-9x9-10");
        assert_eq!(ms.game_type(), GameType::Minesweeper);

        let rk = GameConfig::Risk(risk::RiskConfig::skirmish());
        assert_eq!(rk.game_type(), GameType::Risk);
        assert!(rk.label().starts_with("risk-"));
    }

    #[test]
    fn create_validates_first() {
        let bad = GameConfig::Minesweeper(minesweeper::MinesweeperConfig {
            width: 3,
            height: 3,
            mines: 9,
        });
        assert!(matches!(
            bad.create(None),
            Err(ConfigError::BadMineCount { mines: 9, cells: 9 })
        ));
    }

    #[test]
    fn move_display_matches_grammar() {
        let mv = Move::new(MoveAction::Reveal, MoveTarget::Cell { row: 2, col: 7 });
        assert_eq!(mv.to_string(), "reveal 2 7");
        let mv = Move::new(MoveAction::Pass, MoveTarget::None);
        assert_eq!(mv.to_string(), "pass");
    }
}
