//! Interface to the agent providers being benchmarked.
//!
//! The driver never talks to a model API directly: it hands an
//! [`AgentConnector`] a [`MoveRequest`] (rendered board, legal-action grammar,
//! per-move timeout) and gets back an [`AgentReply`]: either a structured
//! move or free text to be parsed against the game's grammar. Connectors are
//! expected to honor the request timeout and map provider failures onto
//! [`AgentError`], which the driver retries with exponential backoff.
//!
//! An [`AgentDirectory`] maps the agent names players are assigned to onto
//! live connectors; a name the directory cannot resolve yields the worst-case
//! score for that player's game, never a crash.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::errors::AgentError;
use crate::games::Move;

/// Everything an agent needs to choose a move.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    /// Id of the game record being played.
    pub game: Uuid,
    /// 1-based number the chosen move will get.
    pub move_number: u32,
    /// Agent-facing rendering of the current state
    /// (see [`Game::render_state`](crate::games::Game::render_state)).
    pub board: String,
    /// Legal-action grammar description
    /// (see [`Game::move_grammar`](crate::games::Game::move_grammar)).
    pub grammar: String,
    /// How long the connector may take before answering.
    pub timeout: Duration,
}

/// What came back from the provider.
#[derive(Debug, Clone)]
pub enum AgentReply {
    /// The provider produced a structured move (action, target, rationale).
    Structured(Move),
    /// Free text to be parsed with the game's grammar.
    Text(String),
}

/// A connection to one agent provider.
///
/// Implementations are shared across worker threads, so `Send + Sync`; any
/// per-call state belongs in the implementation's interior.
pub trait AgentConnector: Send + Sync {
    /// Request one move. Blocks at most `request.timeout`.
    ///
    /// # Errors
    /// [`AgentError::Timeout`] when no answer arrived in time,
    /// [`AgentError::Provider`] for everything else. Both are retryable.
    fn request_move(&self, request: &MoveRequest) -> Result<AgentReply, AgentError>;
}

/// Registry of known agents, keyed by the name players are assigned to.
#[derive(Default, Clone)]
pub struct AgentDirectory {
    agents: HashMap<String, Arc<dyn AgentConnector>>,
}

impl AgentDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under `name`, replacing any previous holder.
    pub fn register(&mut self, name: impl Into<String>, connector: Arc<dyn AgentConnector>) {
        self.agents.insert(name.into(), connector);
    }

    /// Look up a connector.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentConnector>> {
        self.agents.get(name).cloned()
    }

    /// Registered agent names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for AgentDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDirectory")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Exponential backoff delay before retry `attempt` (0-based): `base * 2^attempt`,
/// saturating instead of overflowing for absurd attempt counts.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{MoveAction, MoveTarget};

    struct CannedAgent;

    impl AgentConnector for CannedAgent {
        fn request_move(&self, request: &MoveRequest) -> Result<AgentReply, AgentError> {
            if request.move_number == 1 {
                Ok(AgentReply::Text("reveal 0 0".into()))
            } else {
                Ok(AgentReply::Structured(Move::new(
                    MoveAction::Flag,
                    MoveTarget::Cell { row: 1, col: 1 },
                )))
            }
        }
    }

    #[test]
    fn directory_resolves_registered_names() {
        let mut directory = AgentDirectory::new();
        assert!(directory.get("gpt-x").is_none());
        directory.register("gpt-x", Arc::new(CannedAgent));
        let connector = directory.get("gpt-x").unwrap();
        let reply = connector
            .request_move(&MoveRequest {
                game: Uuid::new_v4(),
                move_number: 1,
                board: String::new(),
                grammar: String::new(),
                timeout: Duration::from_secs(1),
            })
            .unwrap();
        assert!(matches!(reply, AgentReply::Text(t) if t == "reveal 0 0"));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        // Large attempt counts must not panic.
        let _ = backoff_delay(Duration::from_secs(u64::MAX / 2), 40);
    }
}
