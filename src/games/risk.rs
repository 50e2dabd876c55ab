//! Risk rules engine: single-agent conquest against neutral garrisons.
//!
//! The map is a deterministic ring of territories with cross-chords, so the
//! same config always yields the same adjacency. The agent starts on one
//! territory with a deployable reserve; every other territory holds a neutral
//! garrison. Combat uses Risk dice: the attacker rolls `min(3, armies - 1)`,
//! the defender `min(2, armies)`, dice are paired highest against highest and
//! the defender wins ties.
//!
//! Won when every territory is owned. Lost when no attack can ever happen
//! again: the reserve is empty and no owned territory holds two armies.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, MoveParseError};
use crate::games::{
    parse_num, tokenize, BoardSnapshot, Game, GameOutcome, GameType, Move, MoveAction, MoveOutcome,
    MoveTarget, RejectReason,
};

/// Map size and army counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Number of territories on the map.
    pub territories: usize,
    /// Armies in the agent's starting reserve.
    pub reserve: u32,
    /// Neutral armies defending each unowned territory.
    pub garrison: u32,
}

impl RiskConfig {
    /// Validated custom map.
    ///
    /// # Errors
    /// [`ConfigError`] when there are fewer than two territories or an army
    /// count is zero.
    pub fn new(territories: usize, reserve: u32, garrison: u32) -> Result<Self, ConfigError> {
        let config = RiskConfig {
            territories,
            reserve,
            garrison,
        };
        config.validate()?;
        Ok(config)
    }

    /// Small 8-territory map, lightly defended.
    pub fn skirmish() -> Self {
        RiskConfig {
            territories: 8,
            reserve: 12,
            garrison: 2,
        }
    }

    /// 20-territory map with heavier garrisons.
    pub fn continental() -> Self {
        RiskConfig {
            territories: 20,
            reserve: 30,
            garrison: 3,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.territories < 2 {
            return Err(ConfigError::BadTerritoryCount(self.territories));
        }
        if self.reserve == 0 {
            return Err(ConfigError::BadArmyCount { role: "reserve" });
        }
        if self.garrison == 0 {
            return Err(ConfigError::BadArmyCount { role: "garrison" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Agent,
    Neutral,
}

#[derive(Debug, Clone, Copy)]
struct Territory {
    owner: Owner,
    armies: u32,
}

/// A live Risk game. See the module docs for the rules.
pub struct Risk {
    config: RiskConfig,
    territories: Vec<Territory>,
    adjacency: Vec<Vec<usize>>,
    reserve: u32,
    status: Option<GameOutcome>,
    rng: ChaCha8Rng,
}

impl Risk {
    /// Create a map with the agent holding territory 0.
    ///
    /// `seed` fixes the combat dice; `None` draws from OS entropy. The config
    /// is assumed valid (see [`RiskConfig::new`]).
    pub fn new(config: RiskConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        let n = config.territories;
        let mut territories = vec![
            Territory {
                owner: Owner::Neutral,
                armies: config.garrison,
            };
            n
        ];
        territories[0] = Territory {
            owner: Owner::Agent,
            armies: 1,
        };

        Risk {
            adjacency: build_ring_with_chords(n),
            reserve: config.reserve,
            territories,
            config,
            status: None,
            rng,
        }
    }

    fn owned(&self, t: usize) -> bool {
        self.territories[t].owner == Owner::Agent
    }

    fn deploy(&mut self, territory: usize, armies: u32) -> MoveOutcome {
        if territory >= self.territories.len() {
            return MoveOutcome::Rejected(RejectReason::OutOfBounds);
        }
        if !self.owned(territory) {
            return MoveOutcome::Rejected(RejectReason::NotOwned);
        }
        if armies == 0 || armies > self.reserve {
            return MoveOutcome::Rejected(RejectReason::BadReserveDraw);
        }
        self.reserve -= armies;
        self.territories[territory].armies += armies;
        MoveOutcome::Accepted
    }

    fn attack(&mut self, from: usize, to: usize) -> MoveOutcome {
        if from >= self.territories.len() || to >= self.territories.len() {
            return MoveOutcome::Rejected(RejectReason::OutOfBounds);
        }
        if !self.owned(from) {
            return MoveOutcome::Rejected(RejectReason::NotOwned);
        }
        if self.owned(to) {
            return MoveOutcome::Rejected(RejectReason::NotEnemy);
        }
        if !self.adjacency[from].contains(&to) {
            return MoveOutcome::Rejected(RejectReason::NotAdjacent);
        }
        if self.territories[from].armies < 2 {
            return MoveOutcome::Rejected(RejectReason::InsufficientArmies);
        }

        // One dice exchange per attack move.
        let attacker_dice = (self.territories[from].armies - 1).min(3) as usize;
        let defender_dice = self.territories[to].armies.min(2) as usize;
        let mut attacker = self.roll(attacker_dice);
        let mut defender = self.roll(defender_dice);

        for (a, d) in attacker.drain(..).zip(defender.drain(..)) {
            if a > d {
                self.territories[to].armies -= 1;
            } else {
                self.territories[from].armies -= 1;
            }
        }

        if self.territories[to].armies == 0 {
            // Occupy with as many armies as dice rolled, leaving one behind.
            // A capture implies the attacker won at least one pair, so at
            // least two armies remain on `from`.
            let moving = (attacker_dice as u32).min(self.territories[from].armies - 1);
            self.territories[from].armies -= moving;
            self.territories[to] = Territory {
                owner: Owner::Agent,
                armies: moving,
            };
        }

        self.check_terminal()
    }

    fn check_terminal(&mut self) -> MoveOutcome {
        if self.territories.iter().all(|t| t.owner == Owner::Agent) {
            self.status = Some(GameOutcome::Won);
            return MoveOutcome::Terminal(GameOutcome::Won);
        }
        let can_ever_attack =
            self.reserve > 0 || self.territories.iter().any(|t| t.owner == Owner::Agent && t.armies >= 2);
        if !can_ever_attack {
            self.status = Some(GameOutcome::Lost);
            return MoveOutcome::Terminal(GameOutcome::Lost);
        }
        MoveOutcome::Accepted
    }

    fn roll(&mut self, dice: usize) -> Vec<u8> {
        let mut rolls: Vec<u8> = (0..dice).map(|_| self.rng.gen_range(1..=6)).collect();
        rolls.sort_unstable_by(|a, b| b.cmp(a));
        rolls
    }

    fn owned_count(&self) -> usize {
        self.territories
            .iter()
            .filter(|t| t.owner == Owner::Agent)
            .count()
    }

    fn render_rows(&self) -> Vec<String> {
        self.territories
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let owner = match t.owner {
                    Owner::Agent => "you",
                    Owner::Neutral => "neutral",
                };
                let links = self.adjacency[i]
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("T{i} {owner} armies={} adj={links}", t.armies)
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, owned: &[(usize, u32)], reserve: u32) {
        for t in self.territories.iter_mut() {
            *t = Territory {
                owner: Owner::Neutral,
                armies: self.config.garrison,
            };
        }
        for &(idx, armies) in owned {
            self.territories[idx] = Territory {
                owner: Owner::Agent,
                armies,
            };
        }
        self.reserve = reserve;
    }
}

/// Ring adjacency plus a chord from every territory to the one across the
/// map. Chords are inserted on both endpoints, so the graph stays symmetric
/// for odd sizes too. Deterministic for a given size, so renders and tests
/// reproduce.
fn build_ring_with_chords(n: usize) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); n];
    for i in 0..n {
        let next = (i + 1) % n;
        if next != i {
            adj[i].push(next);
            adj[next].push(i);
        }
        if n >= 6 {
            let across = (i + n / 2) % n;
            adj[i].push(across);
            adj[across].push(i);
        }
    }
    for links in adj.iter_mut() {
        links.sort_unstable();
        links.dedup();
    }
    adj
}

impl Game for Risk {
    fn game_type(&self) -> GameType {
        GameType::Risk
    }

    fn parse_move(&self, text: &str) -> Result<Move, MoveParseError> {
        let tokens = tokenize(text);
        let (&action, args) = tokens.split_first().ok_or(MoveParseError::Empty)?;
        match action.to_ascii_lowercase().as_str() {
            "deploy" => {
                if args.len() != 2 {
                    return Err(MoveParseError::WrongArity {
                        action: "deploy",
                        expected: 2,
                        found: args.len(),
                    });
                }
                Ok(Move::new(
                    MoveAction::Deploy,
                    MoveTarget::Garrison {
                        territory: parse_num(args[0])?,
                        armies: parse_num(args[1])?,
                    },
                ))
            }
            "attack" => {
                if args.len() != 2 {
                    return Err(MoveParseError::WrongArity {
                        action: "attack",
                        expected: 2,
                        found: args.len(),
                    });
                }
                Ok(Move::new(
                    MoveAction::Attack,
                    MoveTarget::Assault {
                        from: parse_num(args[0])?,
                        to: parse_num(args[1])?,
                    },
                ))
            }
            "pass" => {
                if !args.is_empty() {
                    return Err(MoveParseError::WrongArity {
                        action: "pass",
                        expected: 0,
                        found: args.len(),
                    });
                }
                Ok(Move::new(MoveAction::Pass, MoveTarget::None))
            }
            other => Err(MoveParseError::UnknownAction(other.to_string())),
        }
    }

    fn apply_move(&mut self, mv: &Move) -> MoveOutcome {
        if self.status.is_some() {
            return MoveOutcome::Rejected(RejectReason::GameFinished);
        }
        match (mv.action, mv.target) {
            (MoveAction::Deploy, MoveTarget::Garrison { territory, armies }) => {
                self.deploy(territory, armies)
            }
            (MoveAction::Attack, MoveTarget::Assault { from, to }) => self.attack(from, to),
            // Passing is always legal but still runs the terminal check, so a
            // stranded agent is detected rather than passing forever.
            (MoveAction::Pass, MoveTarget::None) => self.check_terminal(),
            _ => MoveOutcome::Rejected(RejectReason::ForeignAction),
        }
    }

    fn is_terminal(&self) -> bool {
        self.status.is_some()
    }

    fn outcome(&self) -> Option<GameOutcome> {
        self.status
    }

    fn render_state(&self) -> String {
        let mut out = format!(
            "risk map with {} territories, reserve={}\n",
            self.config.territories, self.reserve
        );
        for row in self.render_rows() {
            out.push_str(&row);
            out.push('\n');
        }
        out
    }

    fn move_grammar(&self) -> String {
        format!(
            "One move per line: `deploy TERRITORY ARMIES` (from your reserve), \
             `attack FROM TO` (adjacent enemy territory, needs 2+ armies on FROM) or \
             `pass`. Territory ids are 0..{}.",
            self.config.territories
        )
    }

    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            game_type: GameType::Risk,
            rows: self.render_rows(),
            progress: self.owned_count() as f64 / self.config.territories as f64,
        }
    }
}
