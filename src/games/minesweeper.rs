//! Minesweeper rules engine.
//!
//! Mines are placed uniformly at random when the board is created, excluding
//! nothing: the first reveal is *not* guaranteed safe. Revealing a
//! zero-adjacency cell flood-reveals its whole zero chain. The game is won
//! when every safe cell is revealed, lost the moment a mine is revealed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, MoveParseError};
use crate::games::{
    parse_num, tokenize, BoardSnapshot, Game, GameOutcome, GameType, Move, MoveAction, MoveOutcome,
    MoveTarget, RejectReason,
};

/// Board dimensions and mine count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinesweeperConfig {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of mines, fixed at creation.
    pub mines: usize,
}

impl MinesweeperConfig {
    /// Validated custom board.
    ///
    /// # Errors
    /// [`ConfigError`] when a dimension is zero or `mines` is not in
    /// `1..width*height`.
    pub fn new(width: usize, height: usize, mines: usize) -> Result<Self, ConfigError> {
        let config = MinesweeperConfig {
            width,
            height,
            mines,
        };
        config.validate()?;
        Ok(config)
    }

    /// Classic 9x9 board with 10 mines.
    pub fn beginner() -> Self {
        MinesweeperConfig {
            width: 9,
            height: 9,
            mines: 10,
        }
    }

    /// Classic 16x16 board with 40 mines.
    pub fn intermediate() -> Self {
        MinesweeperConfig {
            width: 16,
            height: 16,
            mines: 40,
        }
    }

    /// Classic 30x16 board with 99 mines.
    pub fn expert() -> Self {
        MinesweeperConfig {
            width: 30,
            height: 16,
            mines: 99,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyBoard {
                width: self.width,
                height: self.height,
            });
        }
        let cells = self.width * self.height;
        if self.mines == 0 || self.mines >= cells {
            return Err(ConfigError::BadMineCount {
                mines: self.mines,
                cells,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    mine: bool,
    adjacent: u8,
    revealed: bool,
    flagged: bool,
}

/// A live Minesweeper game. See the module docs for the rules.
pub struct Minesweeper {
    config: MinesweeperConfig,
    cells: Vec<Cell>,
    revealed_safe: usize,
    status: Option<GameOutcome>,
}

impl Minesweeper {
    /// Create a board with freshly placed mines.
    ///
    /// `seed` fixes the placement; `None` draws from OS entropy. The config
    /// is assumed valid (see [`MinesweeperConfig::new`]).
    pub fn new(config: MinesweeperConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        let cell_count = config.width * config.height;
        let mut cells = vec![Cell::default(); cell_count];

        for idx in rand::seq::index::sample(&mut rng, cell_count, config.mines) {
            cells[idx].mine = true;
        }

        let mut game = Minesweeper {
            config,
            cells,
            revealed_safe: 0,
            status: None,
        };
        let counts: Vec<u8> = (0..cell_count)
            .map(|i| game.neighbors(i).filter(|&n| game.cells[n].mine).count() as u8)
            .collect();
        for (cell, adjacent) in game.cells.iter_mut().zip(counts) {
            cell.adjacent = adjacent;
        }
        game
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.config.height && col < self.config.width {
            Some(row * self.config.width + col)
        } else {
            None
        }
    }

    fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let (row, col) = (idx / self.config.width, idx % self.config.width);
        let (w, h) = (self.config.width as isize, self.config.height as isize);
        [-1isize, 0, 1]
            .into_iter()
            .flat_map(move |dr| [-1isize, 0, 1].into_iter().map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| (dr, dc) != (0, 0))
            .filter_map(move |(dr, dc)| {
                let (r, c) = (row as isize + dr, col as isize + dc);
                if r >= 0 && r < h && c >= 0 && c < w {
                    Some((r * w + c) as usize)
                } else {
                    None
                }
            })
    }

    fn safe_total(&self) -> usize {
        self.config.width * self.config.height - self.config.mines
    }

    /// Reveal `idx` and, when it has zero adjacent mines, its whole zero
    /// chain. Flagged cells stay hidden; the chain never crosses them.
    fn flood_reveal(&mut self, idx: usize) {
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            if self.cells[i].revealed || self.cells[i].flagged {
                continue;
            }
            self.cells[i].revealed = true;
            self.revealed_safe += 1;
            if self.cells[i].adjacent == 0 {
                stack.extend(self.neighbors(i));
            }
        }
    }

    fn reveal(&mut self, row: usize, col: usize) -> MoveOutcome {
        let Some(idx) = self.index(row, col) else {
            return MoveOutcome::Rejected(RejectReason::OutOfBounds);
        };
        let cell = self.cells[idx];
        if cell.revealed {
            return MoveOutcome::Rejected(RejectReason::AlreadyRevealed);
        }
        if cell.flagged {
            return MoveOutcome::Rejected(RejectReason::AlreadyFlagged);
        }
        if cell.mine {
            self.cells[idx].revealed = true;
            self.status = Some(GameOutcome::Lost);
            return MoveOutcome::Terminal(GameOutcome::Lost);
        }
        self.flood_reveal(idx);
        if self.revealed_safe == self.safe_total() {
            self.status = Some(GameOutcome::Won);
            return MoveOutcome::Terminal(GameOutcome::Won);
        }
        MoveOutcome::Accepted
    }

    fn set_flag(&mut self, row: usize, col: usize, flagged: bool) -> MoveOutcome {
        let Some(idx) = self.index(row, col) else {
            return MoveOutcome::Rejected(RejectReason::OutOfBounds);
        };
        let cell = self.cells[idx];
        if cell.revealed {
            return MoveOutcome::Rejected(RejectReason::AlreadyRevealed);
        }
        match (cell.flagged, flagged) {
            (true, true) => MoveOutcome::Rejected(RejectReason::AlreadyFlagged),
            (false, false) => MoveOutcome::Rejected(RejectReason::NotFlagged),
            _ => {
                self.cells[idx].flagged = flagged;
                MoveOutcome::Accepted
            }
        }
    }

    fn render_rows(&self) -> Vec<String> {
        (0..self.config.height)
            .map(|row| {
                (0..self.config.width)
                    .map(|col| {
                        let cell = self.cells[row * self.config.width + col];
                        match (cell.revealed, cell.flagged, cell.mine) {
                            (false, true, _) => 'F',
                            (false, false, _) => '#',
                            (true, _, true) => '*',
                            (true, _, false) if cell.adjacent == 0 => '.',
                            (true, _, false) => (b'0' + cell.adjacent) as char,
                        }
                    })
                    .collect()
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn mine_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.mine.then_some(i))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn revealed_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.revealed.then_some(i))
            .collect()
    }
}

impl Game for Minesweeper {
    fn game_type(&self) -> GameType {
        GameType::Minesweeper
    }

    fn parse_move(&self, text: &str) -> Result<Move, MoveParseError> {
        let tokens = tokenize(text);
        let (&action, args) = tokens.split_first().ok_or(MoveParseError::Empty)?;
        let action = match action.to_ascii_lowercase().as_str() {
            "reveal" => MoveAction::Reveal,
            "flag" => MoveAction::Flag,
            "unflag" => MoveAction::Unflag,
            other => return Err(MoveParseError::UnknownAction(other.to_string())),
        };
        if args.len() != 2 {
            return Err(MoveParseError::WrongArity {
                action: match action {
                    MoveAction::Reveal => "reveal",
                    MoveAction::Flag => "flag",
                    _ => "unflag",
                },
                expected: 2,
                found: args.len(),
            });
        }
        let row = parse_num(args[0])?;
        let col = parse_num(args[1])?;
        Ok(Move::new(action, MoveTarget::Cell { row, col }))
    }

    fn apply_move(&mut self, mv: &Move) -> MoveOutcome {
        if self.status.is_some() {
            return MoveOutcome::Rejected(RejectReason::GameFinished);
        }
        let MoveTarget::Cell { row, col } = mv.target else {
            return MoveOutcome::Rejected(RejectReason::ForeignAction);
        };
        match mv.action {
            MoveAction::Reveal => self.reveal(row, col),
            MoveAction::Flag => self.set_flag(row, col, true),
            MoveAction::Unflag => self.set_flag(row, col, false),
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
            "minesweeper {}x{} with {} mines\n",
            self.config.width, self.config.height, self.config.mines
        );
        for row in self.render_rows() {
            out.push_str(&row);
            out.push('\n');
        }
        out
    }

    fn move_grammar(&self) -> String {
        format!(
            "One move per line: `reveal ROW COL`, `flag ROW COL` or `unflag ROW COL`. \
             ROW in 0..{}, COL in 0..{}. `#` hidden, `F` flagged, `.` zero, digits count \
             adjacent mines.",
            self.config.height, self.config.width
        )
    }

    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            game_type: GameType::Minesweeper,
            rows: self.render_rows(),
            progress: self.revealed_safe as f64 / self.safe_total() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reveal(row: usize, col: usize) -> Move {
        Move::new(MoveAction::Reveal, MoveTarget::Cell { row, col })
    }

    #[test]
    fn rejects_inconsistent_configs() {
        assert!(MinesweeperConfig::new(0, 9, 5).is_err());
        assert!(MinesweeperConfig::new(9, 9, 0).is_err());
        assert!(MinesweeperConfig::new(3, 3, 9).is_err());
        assert!(MinesweeperConfig::new(3, 3, 8).is_ok());
    }

    #[test]
    fn places_exactly_the_configured_mines() {
        for seed in 0..20 {
            let game = Minesweeper::new(MinesweeperConfig::beginner(), Some(seed));
            assert_eq!(game.mine_indices().len(), 10);
        }
    }

    #[test]
    fn adjacency_counts_match_placement() {
        let game = Minesweeper::new(MinesweeperConfig::intermediate(), Some(7));
        for (i, cell) in game.cells.iter().enumerate() {
            let expect = game.neighbors(i).filter(|&n| game.cells[n].mine).count();
            assert_eq!(cell.adjacent as usize, expect);
        }
    }

    #[test]
    fn flood_reveal_is_order_independent() {
        // Find a seed with a zero chain of more than one zero cell, reveal
        // the chain from two different entry points, compare revealed sets.
        let config = MinesweeperConfig::beginner();
        for seed in 0..50u64 {
            let mut first = Minesweeper::new(config.clone(), Some(seed));
            let Some(zero) = (0..first.cells.len())
                .find(|&i| !first.cells[i].mine && first.cells[i].adjacent == 0)
            else {
                continue;
            };
            first.flood_reveal(zero);
            let chain: Vec<usize> = first
                .revealed_indices()
                .into_iter()
                .filter(|&i| first.cells[i].adjacent == 0)
                .collect();
            if chain.len() < 2 {
                continue;
            }

            let mut second = Minesweeper::new(config.clone(), Some(seed));
            second.flood_reveal(*chain.last().unwrap());
            assert_eq!(first.revealed_indices(), second.revealed_indices());
            return;
        }
        panic!("no seed produced a multi-cell zero chain");
    }

    #[test]
    fn revealing_a_mine_loses() {
        let mut game = Minesweeper::new(MinesweeperConfig::beginner(), Some(3));
        let mine = game.mine_indices()[0];
        let mv = reveal(mine / 9, mine % 9);
        assert_eq!(
            game.apply_move(&mv),
            MoveOutcome::Terminal(GameOutcome::Lost)
        );
        assert_eq!(game.outcome(), Some(GameOutcome::Lost));
    }

    #[test]
    fn terminal_game_rejects_every_move() {
        let mut game = Minesweeper::new(MinesweeperConfig::beginner(), Some(3));
        let mine = game.mine_indices()[0];
        game.apply_move(&reveal(mine / 9, mine % 9));
        let before = game.revealed_indices();
        assert_eq!(
            game.apply_move(&reveal(0, 0)),
            MoveOutcome::Rejected(RejectReason::GameFinished)
        );
        assert_eq!(game.revealed_indices(), before);
    }

    #[test]
    fn revealing_every_safe_cell_wins() {
        let mut game = Minesweeper::new(MinesweeperConfig::new(2, 2, 1).unwrap(), Some(0));
        let mine = game.mine_indices()[0];
        let mut last = MoveOutcome::Accepted;
        for idx in 0..4 {
            if idx != mine {
                last = game.apply_move(&reveal(idx / 2, idx % 2));
            }
        }
        assert_eq!(last, MoveOutcome::Terminal(GameOutcome::Won));
        assert_eq!(game.outcome(), Some(GameOutcome::Won));
    }

    #[test]
    fn rejections_do_not_mutate() {
        let mut game = Minesweeper::new(MinesweeperConfig::beginner(), Some(11));
        assert_eq!(
            game.apply_move(&reveal(42, 0)),
            MoveOutcome::Rejected(RejectReason::OutOfBounds)
        );
        assert!(game.revealed_indices().is_empty());

        let flag = Move::new(MoveAction::Flag, MoveTarget::Cell { row: 1, col: 1 });
        assert_eq!(game.apply_move(&flag), MoveOutcome::Accepted);
        // Flagged cells cannot be revealed until unflagged.
        assert_eq!(
            game.apply_move(&reveal(1, 1)),
            MoveOutcome::Rejected(RejectReason::AlreadyFlagged)
        );
        assert_eq!(
            game.apply_move(&flag),
            MoveOutcome::Rejected(RejectReason::AlreadyFlagged)
        );
    }

    #[test]
    fn render_is_reproducible() {
        let game = Minesweeper::new(MinesweeperConfig::beginner(), Some(5));
        let other = Minesweeper::new(MinesweeperConfig::beginner(), Some(5));
        assert_eq!(game.render_state(), other.render_state());
        assert_eq!(game.render_state(), game.render_state());
    }

    #[test]
    fn parses_grammar_and_reports_malformed_text() {
        let game = Minesweeper::new(MinesweeperConfig::beginner(), Some(5));
        assert_eq!(
            game.parse_move("reveal 3 4").unwrap(),
            reveal(3, 4)
        );
        assert_eq!(game.parse_move(" "), Err(MoveParseError::Empty));
        assert!(matches!(
            game.parse_move("attack 1 2"),
            Err(MoveParseError::UnknownAction(_))
        ));
        assert!(matches!(
            game.parse_move("reveal 3"),
            Err(MoveParseError::WrongArity { .. })
        ));
        assert!(matches!(
            game.parse_move("reveal three 4"),
            Err(MoveParseError::BadNumber(_))
        ));
    }

    #[test]
    fn snapshot_progress_tracks_revealed_cells() {
        let mut game = Minesweeper::new(MinesweeperConfig::beginner(), Some(9));
        assert_eq!(game.snapshot().progress, 0.0);
        let safe = (0..81).find(|i| !game.cells[*i].mine).unwrap();
        game.apply_move(&reveal(safe / 9, safe % 9));
        let snap = game.snapshot();
        assert!(snap.progress > 0.0 && snap.progress <= 1.0);
        assert_eq!(snap.rows.len(), 9);
    }
}
