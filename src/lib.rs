//! # Ai Gauntlet
//!
//! A modular Rust crate for benchmarking language-model agents on turn-based logic games, scoring their play on weighted metrics and aggregating multi-round competitions.
//!
//! It provides:
//! - Rule engines for the supported games (`Minesweeper`, `Risk`) behind one [`Game`](games::Game) capability trait
//! - A per-game [`MoveDriver`](move_driver::MoveDriver) that prompts an agent, validates the response and applies it until the game ends
//! - A scoring engine turning finished games into weighted composite scores ([`ScoringProfile`](scoring::ScoringProfile))
//! - A [`Session`](session::Session) state machine and [`SessionRunner`](session_runner::SessionRunner) sequencing rounds and players through a competition
//!
//! Agents are remote providers behind the [`AgentConnector`](agent_client::AgentConnector) trait: the driver sends a rendered
//! board plus the legal-move grammar and gets back a structured move or free
//! text. Malformed and illegal responses are recorded as failed moves and
//! bounded by a consecutive-error threshold; provider outages are retried
//! with backoff and, past the budget, abort only the affected game. A session
//! that went `Active` always reaches `Completed`, with worst-case scores
//! standing in for players whose agents produced nothing.
//!
//! Persistence and real-time transport stay outside: the core writes through
//! the [`RecordStore`](storage::RecordStore) trait and broadcasts typed
//! [`Event`](events::Event)s over a channel, and collaborators consume both
//! independently.
//!
//! # Documentation Overview
//!
//! - For the evaluation loop and its failure policy, see the [`move_driver`] and [`session_runner`] modules.
//! - For configuring limits, thresholds and session rules, see [`configuration`].
//! - For the metric and ranking rules, see [`scoring`].
//! - For implementing new games or agent providers, see the [`Game`](games::Game) and [`AgentConnector`](agent_client::AgentConnector) traits.
//!
//! # Usage Example
//!
//! A minimal single-player evaluation with a hand-rolled agent:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ai_gauntlet::prelude::*;
//!
//! struct EchoAgent;
//!
//! impl AgentConnector for EchoAgent {
//!     fn request_move(&self, request: &MoveRequest) -> Result<AgentReply, AgentError> {
//!         // A real connector would forward `request.board` and
//!         // `request.grammar` to a model provider here.
//!         Ok(AgentReply::Text("reveal 0 0".into()))
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut agents = AgentDirectory::new();
//!     agents.register("echo", Arc::new(EchoAgent));
//!
//!     let config = SessionConfig::builder().with_min_players(1).build()?;
//!     let limits = DriverLimits::builder().build()?;
//!
//!     let mut session = Session::create(
//!         SessionFormat::SingleRound,
//!         vec![RoundPlan::new(
//!             GameConfig::Minesweeper(MinesweeperConfig::beginner()),
//!             ScoringProfile::balanced(),
//!         )],
//!     )?;
//!     let host = session.join("me", "echo")?;
//!     session.start(host, &config)?;
//!
//!     let runner = SessionRunner::new(config, limits, agents);
//!     for standing in runner.run(&mut session)? {
//!         println!(
//!             "{}. {}: {:.3}",
//!             standing.rank, standing.display_name, standing.score
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Agent Requirements
//!
//! - Free-text replies must follow the grammar sent with every request
//!   (`reveal ROW COL`, `attack FROM TO`, ...); anything else is counted as
//!   a failed move
//! - Connectors must answer within `request.timeout` and map provider
//!   failures onto [`AgentError`](errors::AgentError)
//! - Connectors are shared across worker threads (`Send + Sync`)
#![warn(missing_docs)]

pub use anyhow;

pub mod agent_client;
pub mod configuration;
pub mod errors;
pub mod events;
pub mod game_record;
pub mod games;
pub mod logger;
pub mod move_driver;
pub mod scoring;
pub mod session;
pub mod session_runner;
pub mod storage;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use ai_gauntlet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent_client::{AgentConnector, AgentDirectory, AgentReply, MoveRequest};
    pub use crate::configuration::{DriverLimits, SessionConfig};
    pub use crate::errors::AgentError;
    pub use crate::events::{Event, EventSink};
    pub use crate::game_record::{GameRecord, GameStatus};
    pub use crate::games::minesweeper::MinesweeperConfig;
    pub use crate::games::risk::RiskConfig;
    pub use crate::games::{Game, GameConfig, GameType};
    pub use crate::move_driver::{CancelToken, MoveDriver};
    pub use crate::scoring::ScoringProfile;
    pub use crate::session::{RoundPlan, Session, SessionFormat, SessionStatus, Standing};
    pub use crate::session_runner::SessionRunner;
    pub use crate::storage::{MemoryStore, RecordStore};
}
