//! The loop that alternates between asking an agent for a move and applying
//! it to a game.
//!
//! One driver owns one game and its [`GameRecord`], and is strictly
//! sequential: `Idle → Prompting → AwaitingResponse → Validating → Applying`
//! and back, until the game is terminal or the driver gives up. Invalid
//! responses (malformed or illegal) are recorded as failed moves and increase
//! a consecutive-error count; a legal applied move resets it. The driver
//! aborts (status `aborted`, deliberately distinct from `lost`) when the
//! error count exceeds its threshold, the move limit is reached, the round
//! deadline passes, the cancel token fires, or the provider keeps failing
//! past its retry budget.
//!
//! Every transition that produced an attempt emits a progress event through
//! the (non-blocking) [`EventSink`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::agent_client::{backoff_delay, AgentConnector, AgentReply, MoveRequest};
use crate::configuration::DriverLimits;
use crate::errors::AgentError;
use crate::events::{Event, EventSink};
use crate::game_record::{GameRecord, GameStatus};
use crate::games::{Game, GameOutcome, Move, MoveOutcome};

/// Cooperative cancellation flag, shared between a host and every driver it
/// may want to stop. Cancelling never corrupts already-recorded moves; the
/// driver finishes its bookkeeping and closes the record as `aborted`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where a game sits inside a competition, for event consumers. Empty for
/// one-off games.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameContext {
    /// Session the game belongs to.
    pub session: Option<Uuid>,
    /// 1-based round number.
    pub round: Option<u32>,
    /// Player the game was assigned to.
    pub player: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    Prompting,
    AwaitingResponse,
    Validating,
    Applying,
    Terminal,
    Aborted,
}

/// Drives one game to completion. See the module docs.
pub struct MoveDriver {
    game: Box<dyn Game>,
    record: GameRecord,
    connector: Arc<dyn AgentConnector>,
    limits: DriverLimits,
    events: EventSink,
    cancel: CancelToken,
    deadline: Option<Instant>,
    context: GameContext,
    consecutive_errors: u32,
    state: DriverState,
    pending_request: Option<MoveRequest>,
    pending_reply: Option<AgentReply>,
    pending_move: Option<(String, Move)>,
}

impl MoveDriver {
    /// Driver for a fresh game. `difficulty` labels the record (see
    /// [`GameConfig::label`](crate::games::GameConfig::label)).
    pub fn new(
        game: Box<dyn Game>,
        difficulty: impl Into<String>,
        connector: Arc<dyn AgentConnector>,
        limits: DriverLimits,
    ) -> Self {
        let record = GameRecord::open(game.game_type(), difficulty);
        MoveDriver {
            game,
            record,
            connector,
            limits,
            events: EventSink::disabled(),
            cancel: CancelToken::new(),
            deadline: None,
            context: GameContext::default(),
            consecutive_errors: 0,
            state: DriverState::Idle,
            pending_request: None,
            pending_reply: None,
            pending_move: None,
        }
    }

    /// Attach a broadcast sink.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Attach a shared cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Hard deadline (typically the round time limit) past which the driver
    /// aborts instead of prompting again.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach competition context carried on emitted events.
    #[must_use]
    pub fn with_context(mut self, context: GameContext) -> Self {
        self.context = context;
        self
    }

    /// The record id this driver writes to.
    pub fn game_id(&self) -> Uuid {
        self.record.id
    }

    /// Play the game to its end and hand back the closed record.
    #[instrument(skip_all, fields(game = %self.record.id))]
    pub fn run(mut self) -> GameRecord {
        self.events.emit(Event::GameStarted {
            session: self.context.session,
            round: self.context.round,
            player: self.context.player,
            game: self.record.id,
            game_type: self.game.game_type(),
        });

        loop {
            trace!(state = ?self.state, errors = self.consecutive_errors);
            match self.state {
                DriverState::Idle => self.on_idle(),
                DriverState::Prompting => self.on_prompting(),
                DriverState::AwaitingResponse => self.on_awaiting(),
                DriverState::Validating => self.on_validating(),
                DriverState::Applying => self.on_applying(),
                DriverState::Terminal => {
                    let status = match self.game.outcome() {
                        Some(GameOutcome::Won) => GameStatus::Won,
                        _ => GameStatus::Lost,
                    };
                    return self.finish(status);
                }
                DriverState::Aborted => return self.finish(GameStatus::Aborted),
            }
        }
    }

    fn on_idle(&mut self) {
        if self.cancel.is_cancelled() {
            debug!("cancelled");
            self.state = DriverState::Aborted;
        } else if self.past_deadline() {
            debug!("round deadline elapsed");
            self.state = DriverState::Aborted;
        } else if self.record.total_moves() >= self.limits.max_moves {
            debug!(max_moves = self.limits.max_moves, "move limit reached");
            self.state = DriverState::Aborted;
        } else if self.consecutive_errors > self.limits.error_threshold {
            debug!(
                threshold = self.limits.error_threshold,
                "error threshold exceeded"
            );
            self.state = DriverState::Aborted;
        } else {
            self.state = DriverState::Prompting;
        }
    }

    fn on_prompting(&mut self) {
        let timeout = match self.remaining_time() {
            Some(remaining) => self.limits.agent_timeout.min(remaining),
            None => self.limits.agent_timeout,
        };
        self.pending_request = Some(MoveRequest {
            game: self.record.id,
            move_number: self.record.total_moves() + 1,
            board: self.game.render_state(),
            grammar: self.game.move_grammar(),
            timeout,
        });
        self.state = DriverState::AwaitingResponse;
    }

    fn on_awaiting(&mut self) {
        let request = self.pending_request.take().expect("prompt before await");
        match self.request_with_retry(&request) {
            Ok(reply) => {
                self.pending_reply = Some(reply);
                self.state = DriverState::Validating;
            }
            Err(e) => {
                warn!(error = %e, "agent gave no usable response, aborting game");
                self.emit_error(format!("agent failed past retry budget: {e}"));
                self.state = DriverState::Aborted;
            }
        }
    }

    fn on_validating(&mut self) {
        let reply = self.pending_reply.take().expect("await before validate");
        let (raw, parsed) = match reply {
            AgentReply::Structured(mv) => (mv.to_string(), Ok(mv)),
            AgentReply::Text(text) => {
                let parsed = self.game.parse_move(&text);
                (text, parsed)
            }
        };
        match parsed {
            Ok(mv) => {
                self.pending_move = Some((raw, mv));
                self.state = DriverState::Applying;
            }
            Err(e) => {
                self.consecutive_errors += 1;
                let number = self
                    .record
                    .push_move(raw, None, false, Some(e.to_string()));
                self.events.emit(Event::MoveCompleted {
                    game: self.record.id,
                    move_number: number,
                    action: None,
                    valid: false,
                    board: self.game.snapshot(),
                });
                self.state = DriverState::Idle;
            }
        }
    }

    fn on_applying(&mut self) {
        let (raw, mv) = self.pending_move.take().expect("validate before apply");
        let outcome = self.game.apply_move(&mv);
        let action = mv.action;
        let (valid, detail, next) = match outcome {
            MoveOutcome::Accepted => (true, None, DriverState::Idle),
            MoveOutcome::Terminal(_) => (true, None, DriverState::Terminal),
            MoveOutcome::Rejected(reason) => {
                (false, Some(reason.to_string()), DriverState::Idle)
            }
        };
        if valid {
            self.consecutive_errors = 0;
        } else {
            self.consecutive_errors += 1;
        }
        let number = self.record.push_move(raw, Some(mv), valid, detail);
        self.events.emit(Event::MoveCompleted {
            game: self.record.id,
            move_number: number,
            action: Some(action),
            valid,
            board: self.game.snapshot(),
        });
        self.state = next;
    }

    fn finish(mut self, status: GameStatus) -> GameRecord {
        self.record.close(status, Some(self.game.snapshot()));
        self.events.emit(Event::GameCompleted {
            game: self.record.id,
            status,
            moves: self.record.total_moves(),
            board: self.record.final_board.clone(),
        });
        self.record
    }

    fn request_with_retry(&mut self, request: &MoveRequest) -> Result<AgentReply, AgentError> {
        let mut last_error = None;
        for attempt in 0..=self.limits.agent_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.limits.retry_backoff, attempt - 1);
                if let Some(remaining) = self.remaining_time() {
                    if delay >= remaining {
                        break;
                    }
                }
                thread::sleep(delay);
            }
            if self.cancel.is_cancelled() {
                break;
            }
            match self.connector.request_move(request) {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!(error = %e, attempt, "agent request failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AgentError::Provider("request never attempted".into())))
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn remaining_time(&self) -> Option<std::time::Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    fn emit_error(&self, message: String) {
        self.events.emit(Event::Error {
            session: self.context.session,
            game: Some(self.record.id),
            message,
        });
    }
}
