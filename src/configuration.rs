//! Configuration surface of the evaluation core.
//!
//! Nothing here is hardcoded inside the engines: move limits, error
//! thresholds, provider timeouts and session rules are all supplied by the
//! caller, either programmatically through the builders or from environment
//! variables with `from_env()`.
//!
//! # Environment Variables
//!
//! All values are optional; unset or unparsable values fall back to the
//! defaults.
//!
//! - `GAUNTLET_MAX_MOVES` — attempts allowed per game (default: `200`)
//! - `GAUNTLET_ERROR_THRESHOLD` — consecutive invalid responses allowed
//!   before a game aborts (default: `3`)
//! - `GAUNTLET_AGENT_TIMEOUT_MS` — per-move provider timeout (default: `30000`)
//! - `GAUNTLET_AGENT_RETRIES` — provider retries per move (default: `2`)
//! - `GAUNTLET_RETRY_BACKOFF_MS` — base backoff, doubled per retry (default: `500`)
//! - `GAUNTLET_MIN_PLAYERS` — players required to start a session (default: `2`)
//! - `GAUNTLET_HOST_READY_EXEMPT` — `"true"`/`"false"` (default: `true`)
//! - `GAUNTLET_CONCURRENCY` — games running at once (default: physical CPUs)
//! - `GAUNTLET_BOARD_SEED` — fixed board seed for reproducible runs

use std::env;
use std::time::Duration;

use crate::errors::ConfigError;

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok()?.parse().ok()
}

fn env_flag(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(val) => val.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

/// Per-game limits enforced by the move driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLimits {
    pub(crate) max_moves: u32,
    pub(crate) error_threshold: u32,
    pub(crate) agent_timeout: Duration,
    pub(crate) agent_retries: u32,
    pub(crate) retry_backoff: Duration,
}

impl Default for DriverLimits {
    fn default() -> Self {
        DriverLimits {
            max_moves: 200,
            error_threshold: 3,
            agent_timeout: Duration::from_secs(30),
            agent_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl DriverLimits {
    /// Create a builder.
    pub fn builder() -> DriverLimitsBuilder {
        DriverLimitsBuilder::default()
    }

    /// Consecutive invalid responses allowed before aborting.
    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    /// Attempts allowed per game.
    pub fn max_moves(&self) -> u32 {
        self.max_moves
    }
}

/// Builder for [`DriverLimits`].
#[derive(Debug, Default)]
pub struct DriverLimitsBuilder {
    max_moves: Option<u32>,
    error_threshold: Option<u32>,
    agent_timeout: Option<Duration>,
    agent_retries: Option<u32>,
    retry_backoff: Option<Duration>,
}

impl DriverLimitsBuilder {
    /// Builder initialized from the `GAUNTLET_*` environment variables
    /// listed in the module docs.
    #[must_use]
    pub fn from_env() -> Self {
        DriverLimitsBuilder {
            max_moves: parse_env("GAUNTLET_MAX_MOVES"),
            error_threshold: parse_env("GAUNTLET_ERROR_THRESHOLD"),
            agent_timeout: parse_env("GAUNTLET_AGENT_TIMEOUT_MS").map(Duration::from_millis),
            agent_retries: parse_env("GAUNTLET_AGENT_RETRIES"),
            retry_backoff: parse_env("GAUNTLET_RETRY_BACKOFF_MS").map(Duration::from_millis),
        }
    }

    /// Sets the maximum number of attempts (valid or not) per game.
    #[must_use]
    pub fn with_max_moves(mut self, max: u32) -> Self {
        self.max_moves = Some(max);
        self
    }

    /// Sets how many *consecutive* invalid responses are allowed before the
    /// game is aborted.
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    /// Sets the per-move provider timeout.
    #[must_use]
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = Some(timeout);
        self
    }

    /// Sets how many times a failed provider call is retried per move.
    #[must_use]
    pub fn with_agent_retries(mut self, retries: u32) -> Self {
        self.agent_retries = Some(retries);
        self
    }

    /// Sets the base backoff delay, doubled on every retry.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Consumes the builder.
    ///
    /// # Errors
    /// [`ConfigError`] when a limit is zero where zero makes the driver
    /// unable to ever play a move.
    pub fn build(self) -> Result<DriverLimits, ConfigError> {
        let defaults = DriverLimits::default();
        let limits = DriverLimits {
            max_moves: self.max_moves.unwrap_or(defaults.max_moves),
            error_threshold: self.error_threshold.unwrap_or(defaults.error_threshold),
            agent_timeout: self.agent_timeout.unwrap_or(defaults.agent_timeout),
            agent_retries: self.agent_retries.unwrap_or(defaults.agent_retries),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
        };
        if limits.max_moves == 0 {
            return Err(ConfigError::Invalid("max_moves must be positive".into()));
        }
        if limits.agent_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "agent_timeout must be positive".into(),
            ));
        }
        Ok(limits)
    }
}

/// Session-level rules: who may start, how wide the worker pool is, and
/// whether boards are seeded for reproducibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub(crate) min_players: usize,
    pub(crate) host_ready_exempt: bool,
    pub(crate) concurrency: usize,
    pub(crate) board_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            min_players: 2,
            host_ready_exempt: true,
            // Physical cores, not logical: the pool is provider-bound anyway.
            concurrency: num_cpus::get_physical().max(1),
            board_seed: None,
        }
    }
}

impl SessionConfig {
    /// Create a builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Players required before the host may start.
    pub fn min_players(&self) -> usize {
        self.min_players
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    min_players: Option<usize>,
    host_ready_exempt: Option<bool>,
    concurrency: Option<usize>,
    board_seed: Option<u64>,
}

impl SessionConfigBuilder {
    /// Builder initialized from the `GAUNTLET_*` environment variables
    /// listed in the module docs.
    #[must_use]
    pub fn from_env() -> Self {
        SessionConfigBuilder {
            min_players: parse_env("GAUNTLET_MIN_PLAYERS"),
            host_ready_exempt: Some(env_flag("GAUNTLET_HOST_READY_EXEMPT", true)),
            concurrency: parse_env("GAUNTLET_CONCURRENCY"),
            board_seed: parse_env("GAUNTLET_BOARD_SEED"),
        }
    }

    /// Sets the minimum player count required to start.
    #[must_use]
    pub fn with_min_players(mut self, min: usize) -> Self {
        self.min_players = Some(min);
        self
    }

    /// Sets whether the host's own ready flag is ignored when starting.
    #[must_use]
    pub fn with_host_ready_exempt(mut self, exempt: bool) -> Self {
        self.host_ready_exempt = Some(exempt);
        self
    }

    /// Sets how many games may run at once, bounding pressure on the agent
    /// providers.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    /// Fixes the board seed so every game in the session is reproducible.
    #[must_use]
    pub fn with_board_seed(mut self, seed: u64) -> Self {
        self.board_seed = Some(seed);
        self
    }

    /// Consumes the builder.
    ///
    /// # Errors
    /// [`ConfigError`] when the minimum player count or concurrency is zero.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let defaults = SessionConfig::default();
        let config = SessionConfig {
            min_players: self.min_players.unwrap_or(defaults.min_players),
            host_ready_exempt: self.host_ready_exempt.unwrap_or(defaults.host_ready_exempt),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            board_seed: self.board_seed.or(defaults.board_seed),
        };
        if config.min_players == 0 {
            return Err(ConfigError::Invalid("min_players must be positive".into()));
        }
        if config.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be positive".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let limits = DriverLimits::default();
        assert_eq!(limits.error_threshold, 3);
        assert!(limits.max_moves > 0);

        let config = SessionConfig::default();
        assert!(config.concurrency >= 1);
        assert_eq!(config.min_players, 2);
        assert!(config.host_ready_exempt);
    }

    #[test]
    fn builders_override_selected_fields_only() {
        let limits = DriverLimits::builder()
            .with_max_moves(50)
            .with_error_threshold(1)
            .build()
            .unwrap();
        assert_eq!(limits.max_moves, 50);
        assert_eq!(limits.error_threshold, 1);
        assert_eq!(limits.agent_retries, DriverLimits::default().agent_retries);

        let config = SessionConfig::builder()
            .with_min_players(1)
            .with_board_seed(99)
            .build()
            .unwrap();
        assert_eq!(config.min_players, 1);
        assert_eq!(config.board_seed, Some(99));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(DriverLimits::builder().with_max_moves(0).build().is_err());
        assert!(SessionConfig::builder().with_concurrency(0).build().is_err());
        assert!(SessionConfig::builder().with_min_players(0).build().is_err());
    }
}
