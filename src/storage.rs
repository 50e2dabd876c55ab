//! Narrow contract to the persistence collaborator.
//!
//! The core never depends on a database: it writes game records and session
//! snapshots through [`RecordStore`] and reads a ranked leaderboard back.
//! Writes are best-effort from the caller's point of view (the runner logs
//! and carries on when a write fails) but the collaborator is expected to
//! provide at-least-once delivery.
//!
//! [`MemoryStore`] is the reference implementation used by tests and one-off
//! evaluations.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game_record::GameRecord;
use crate::games::GameType;
use crate::scoring::RankKey;
use crate::session::{Session, SessionStatus};

/// Which slice of the leaderboard to read.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardFilter {
    /// Only sessions that played this game type.
    pub game_type: Option<GameType>,
    /// Only entries for this agent.
    pub agent: Option<String>,
    /// Truncate to the top N entries.
    pub limit: Option<usize>,
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based rank after filtering.
    pub rank: u32,
    /// Player display name.
    pub display_name: String,
    /// Agent that played.
    pub agent: String,
    /// Cumulative score in the source session.
    pub score: f64,
    /// Total moves, the first tie-breaker.
    pub total_moves: u32,
    /// When the player's last game closed.
    pub completed_at: DateTime<Utc>,
}

/// Storage collaborator consumed by the excluded persistence layer.
pub trait RecordStore: Send + Sync {
    /// Persist one finished (or aborted) game record.
    ///
    /// # Errors
    /// Backend-specific; the caller logs and continues.
    fn save_game_record(&self, record: &GameRecord) -> anyhow::Result<()>;

    /// Persist the current state of a session (players, rounds, standings
    /// inputs). Called at least after every round and at completion.
    ///
    /// # Errors
    /// Backend-specific; the caller logs and continues.
    fn save_session_snapshot(&self, session: &Session) -> anyhow::Result<()>;

    /// Ranked entries derived from completed sessions.
    ///
    /// # Errors
    /// Backend-specific.
    fn read_leaderboard(&self, filter: &LeaderboardFilter) -> anyhow::Result<Vec<LeaderboardEntry>>;
}

/// In-memory [`RecordStore`], keyed by record/session id so repeated saves
/// overwrite instead of duplicating (at-least-once friendly).
#[derive(Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<Uuid, GameRecord>>,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct game records saved.
    pub fn game_count(&self) -> usize {
        self.games.lock().expect("poisoned").len()
    }

    /// Latest snapshot of a session, if any.
    pub fn session(&self, id: Uuid) -> Option<Session> {
        self.sessions.lock().expect("poisoned").get(&id).cloned()
    }

    /// Latest copy of a game record, if any.
    pub fn game(&self, id: Uuid) -> Option<GameRecord> {
        self.games.lock().expect("poisoned").get(&id).cloned()
    }
}

impl RecordStore for MemoryStore {
    fn save_game_record(&self, record: &GameRecord) -> anyhow::Result<()> {
        self.games
            .lock()
            .expect("poisoned")
            .insert(record.id, record.clone());
        Ok(())
    }

    fn save_session_snapshot(&self, session: &Session) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .expect("poisoned")
            .insert(session.id(), session.clone());
        Ok(())
    }

    fn read_leaderboard(&self, filter: &LeaderboardFilter) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let sessions = self.sessions.lock().expect("poisoned");
        let mut rows: Vec<(RankKey, LeaderboardEntry)> = sessions
            .values()
            .filter(|s| s.status() == SessionStatus::Completed)
            .filter(|s| match filter.game_type {
                Some(gt) => s.rounds().iter().any(|r| r.plan.game.game_type() == gt),
                None => true,
            })
            .flat_map(|s| s.players().iter())
            .filter(|p| match &filter.agent {
                Some(agent) => &p.assigned_agent == agent,
                None => true,
            })
            .map(|p| {
                let completed_at = p.last_finished.unwrap_or(DateTime::<Utc>::MAX_UTC);
                let key = RankKey {
                    score: p.cumulative_score,
                    moves: p.total_moves,
                    finished_at: completed_at,
                };
                let entry = LeaderboardEntry {
                    rank: 0,
                    display_name: p.display_name.clone(),
                    agent: p.assigned_agent.clone(),
                    score: p.cumulative_score,
                    total_moves: p.total_moves,
                    completed_at,
                };
                (key, entry)
            })
            .collect();

        rows.sort_by(|(a, _), (b, _)| a.compare(b));
        let mut entries: Vec<LeaderboardEntry> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (_, mut entry))| {
                entry.rank = i as u32 + 1;
                entry
            })
            .collect();
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
