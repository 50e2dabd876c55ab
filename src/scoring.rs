//! Converts finished game records into comparable numeric scores.
//!
//! Each metric is a pure function of the [`GameRecord`]: a raw value plus a
//! monotonic normalization into `[0, 1]`. A [`ScoringProfile`] weights the
//! normalized values into one composite score. Profiles whose weights do not
//! sum to 1.0 fail with [`ScoringError::InvalidProfile`]; the engine never
//! renormalizes on the caller's behalf; auto-balancing is a UI convenience
//! that does not belong here.
//!
//! Preset profiles are nothing but named weight maps. Externally defined
//! composites (leaderboard formulas and the like) are expected to arrive as
//! profiles too; the engine treats every profile uniformly.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ScoringError;
use crate::game_record::{GameRecord, GameStatus};

/// Component id: 1.0 for a won game, 0.0 otherwise.
pub const WIN_RATE: &str = "win_rate";
/// Component id: legal moves over total attempts.
pub const VALID_MOVE_RATE: &str = "valid_move_rate";
/// Component id: fraction of the winning condition reached (final snapshot).
pub const BOARD_COVERAGE: &str = "board_coverage";
/// Component id: par thinking time over actual duration, clipped to `[0, 1]`.
pub const TIME_EFFICIENCY: &str = "time_efficiency";

/// Every component id a profile may reference.
pub const COMPONENT_IDS: [&str; 4] = [WIN_RATE, VALID_MOVE_RATE, BOARD_COVERAGE, TIME_EFFICIENCY];

/// Tolerance on the weight sum check.
const WEIGHT_EPSILON: f64 = 1e-6;

/// Par thinking time per decision, the reference for [`TIME_EFFICIENCY`].
const PAR_SECS_PER_MOVE: f64 = 10.0;

/// One weighted metric of a scored game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    /// Which metric this is (one of [`COMPONENT_IDS`]).
    pub id: String,
    /// Raw metric value, before normalization.
    pub raw: f64,
    /// Normalized value in `[0, 1]`.
    pub normalized: f64,
    /// Weight taken from the profile, in `[0, 1]`.
    pub weight: f64,
}

/// A named weight distribution over scoring components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    /// Profile name, for display and error messages.
    pub name: String,
    weights: BTreeMap<String, f64>,
}

impl ScoringProfile {
    /// Profile from an explicit component → weight mapping. Not validated
    /// here: validation happens when the profile is applied (or explicitly
    /// via [`validate`](Self::validate)).
    pub fn new<I, K>(name: impl Into<String>, weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        ScoringProfile {
            name: name.into(),
            weights: weights.into_iter().map(|(k, w)| (k.into(), w)).collect(),
        }
    }

    /// Even split between winning, accuracy, coverage and speed.
    pub fn balanced() -> Self {
        Self::new(
            "balanced",
            [
                (WIN_RATE, 0.4),
                (VALID_MOVE_RATE, 0.2),
                (BOARD_COVERAGE, 0.2),
                (TIME_EFFICIENCY, 0.2),
            ],
        )
    }

    /// Rewards fast play above everything else.
    pub fn speed_focused() -> Self {
        Self::new(
            "speed-focused",
            [
                (TIME_EFFICIENCY, 0.4),
                (WIN_RATE, 0.3),
                (BOARD_COVERAGE, 0.2),
                (VALID_MOVE_RATE, 0.1),
            ],
        )
    }

    /// Rewards legal, correct play; ignores the clock.
    pub fn accuracy_focused() -> Self {
        Self::new(
            "accuracy-focused",
            [
                (VALID_MOVE_RATE, 0.4),
                (WIN_RATE, 0.3),
                (BOARD_COVERAGE, 0.3),
            ],
        )
    }

    /// Check that every referenced component exists and the weights sum
    /// to 1.0 (±epsilon).
    ///
    /// # Errors
    /// [`ScoringError::UnknownComponent`] or [`ScoringError::InvalidProfile`].
    pub fn validate(&self) -> Result<(), ScoringError> {
        for id in self.weights.keys() {
            if !COMPONENT_IDS.contains(&id.as_str()) {
                return Err(ScoringError::UnknownComponent {
                    profile: self.name.clone(),
                    component: id.clone(),
                });
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ScoringError::InvalidProfile {
                name: self.name.clone(),
                sum,
            });
        }
        Ok(())
    }

    /// The component → weight entries, in stable (sorted) order.
    pub fn weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &w)| (k.as_str(), w))
    }
}

/// A scored game: the composite plus its per-component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameScore {
    /// `Σ(normalized × weight)` over the profile.
    pub composite: f64,
    /// The weighted components, in profile order.
    pub components: Vec<ScoreComponent>,
}

/// Score one finished game under a profile.
///
/// # Errors
/// [`ScoringError`] when the profile is invalid; never for properties of the
/// record itself: aborted and even empty games score (poorly) rather than
/// fail.
pub fn score_game(record: &GameRecord, profile: &ScoringProfile) -> Result<GameScore, ScoringError> {
    profile.validate()?;
    let components: Vec<ScoreComponent> = profile
        .weights()
        .map(|(id, weight)| {
            let (raw, normalized) = evaluate_component(record, id);
            ScoreComponent {
                id: id.to_string(),
                raw,
                normalized,
                weight,
            }
        })
        .collect();
    let composite = components.iter().map(|c| c.normalized * c.weight).sum();
    Ok(GameScore {
        composite,
        components,
    })
}

/// The defined worst case for missing data: every component at zero.
///
/// Used when a player's agent produced no scoreable game at all, so the
/// round aggregates instead of crashing.
///
/// # Errors
/// [`ScoringError`] when the profile is invalid.
pub fn worst_case(profile: &ScoringProfile) -> Result<GameScore, ScoringError> {
    profile.validate()?;
    let components = profile
        .weights()
        .map(|(id, weight)| ScoreComponent {
            id: id.to_string(),
            raw: 0.0,
            normalized: 0.0,
            weight,
        })
        .collect();
    Ok(GameScore {
        composite: 0.0,
        components,
    })
}

fn evaluate_component(record: &GameRecord, id: &str) -> (f64, f64) {
    match id {
        WIN_RATE => {
            let won = if record.status == GameStatus::Won { 1.0 } else { 0.0 };
            (won, won)
        }
        VALID_MOVE_RATE => {
            let total = record.total_moves();
            if total == 0 {
                return (0.0, 0.0);
            }
            let rate = f64::from(record.valid_moves()) / f64::from(total);
            (rate, rate.clamp(0.0, 1.0))
        }
        BOARD_COVERAGE => {
            let progress = record
                .final_board
                .as_ref()
                .map(|b| b.progress)
                .unwrap_or(0.0);
            (progress, progress.clamp(0.0, 1.0))
        }
        TIME_EFFICIENCY => {
            let moves = record.total_moves();
            let Some(duration) = record.duration() else {
                return (0.0, 0.0);
            };
            if moves == 0 {
                return (0.0, 0.0);
            }
            let secs = duration.num_milliseconds() as f64 / 1000.0;
            let par = f64::from(moves) * PAR_SECS_PER_MOVE;
            if secs <= 0.0 {
                return (0.0, 1.0);
            }
            (secs, (par / secs).clamp(0.0, 1.0))
        }
        // validate() guarantees the id is known.
        _ => (0.0, 0.0),
    }
}

/// Ranking key shared by standings and leaderboards: higher composite first,
/// ties broken by fewer total moves, then by earlier completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankKey {
    /// Composite (or cumulative) score.
    pub score: f64,
    /// Total moves played.
    pub moves: u32,
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
}

impl RankKey {
    /// Ordering such that sorting ascending puts the best entry first.
    pub fn compare(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then(self.moves.cmp(&other.moves))
            .then(self.finished_at.cmp(&other.finished_at))
    }
}
