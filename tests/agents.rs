//! Deterministic scripted agents used by the competition tests. They parse
//! the same board renderings a real model would receive, so the tests also
//! exercise the agent-facing request format.

use ai_gauntlet::prelude::*;

/// Minesweeper player: reveals the first hidden cell it can find, scanning
/// row-major. Every move it makes is legal, so games end in a win, a mine or
/// the move limit, never the error threshold.
pub struct BoardScanner;

impl AgentConnector for BoardScanner {
    fn request_move(&self, request: &MoveRequest) -> Result<AgentReply, AgentError> {
        // First line is the header, the rest is one string per row.
        for (row, line) in request.board.lines().skip(1).enumerate() {
            if let Some(col) = line.chars().position(|c| c == '#') {
                return Ok(AgentReply::Text(format!("reveal {row} {col}")));
            }
        }
        Err(AgentError::Provider("no hidden cell left to reveal".into()))
    }
}

#[derive(Debug, Clone)]
struct TerritoryView {
    id: usize,
    owned: bool,
    armies: u32,
    adjacent: Vec<usize>,
}

/// Risk player: reinforces a frontline territory, then attacks neutral
/// neighbors until the map is taken or it runs out of strength.
pub struct Conqueror;

impl Conqueror {
    fn parse_board(board: &str) -> (u32, Vec<TerritoryView>) {
        let mut lines = board.lines();
        let header = lines.next().unwrap_or_default();
        let reserve = header
            .split("reserve=")
            .nth(1)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        let territories = lines
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                let id = tokens.next()?.strip_prefix('T')?.parse().ok()?;
                let owned = tokens.next()? == "you";
                let armies = tokens.next()?.strip_prefix("armies=")?.parse().ok()?;
                let adjacent = tokens
                    .next()?
                    .strip_prefix("adj=")?
                    .split(',')
                    .filter_map(|t| t.parse().ok())
                    .collect();
                Some(TerritoryView {
                    id,
                    owned,
                    armies,
                    adjacent,
                })
            })
            .collect();
        (reserve, territories)
    }
}

impl AgentConnector for Conqueror {
    fn request_move(&self, request: &MoveRequest) -> Result<AgentReply, AgentError> {
        let (reserve, territories) = Self::parse_board(&request.board);
        let neutral = |id: usize| territories.iter().any(|t| t.id == id && !t.owned);

        // Attack from any territory strong enough to fight a neutral border.
        for t in territories.iter().filter(|t| t.owned && t.armies >= 2) {
            if let Some(&target) = t.adjacent.iter().find(|&&a| neutral(a)) {
                return Ok(AgentReply::Text(format!("attack {} {target}", t.id)));
            }
        }
        // Otherwise push the reserve onto a frontline territory.
        if reserve > 0 {
            if let Some(t) = territories
                .iter()
                .find(|t| t.owned && t.adjacent.iter().any(|&a| neutral(a)))
            {
                return Ok(AgentReply::Text(format!("deploy {} {reserve}", t.id)));
            }
        }
        Ok(AgentReply::Text("pass".into()))
    }
}

/// Simulates a provider that is down for the whole competition.
pub struct Mute;

impl AgentConnector for Mute {
    fn request_move(&self, _request: &MoveRequest) -> Result<AgentReply, AgentError> {
        Err(AgentError::Provider("provider unreachable".into()))
    }
}
