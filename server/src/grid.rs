//! Battle grid: static walls plus a player overlay derived from the slot table

use crate::slots::Player;
use log::warn;
use shared::{marker, Direction, GRID_COLS, GRID_ROWS, OPEN_SYMBOL, WALLS, WALL_SYMBOL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Open,
    Wall,
    /// Painted by `refresh_markers`, holds the occupying slot index.
    Occupied(usize),
}

impl Cell {
    pub fn symbol(self) -> char {
        match self {
            Cell::Open => OPEN_SYMBOL,
            Cell::Wall => WALL_SYMBOL,
            Cell::Occupied(slot) => marker(slot),
        }
    }
}

/// Fixed-size cell matrix. Walls are placed once in `new` and never change;
/// everything else is recomputed from player state.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: [[Cell; GRID_COLS]; GRID_ROWS],
}

impl Grid {
    pub fn new() -> Self {
        let mut cells = [[Cell::Open; GRID_COLS]; GRID_ROWS];
        for (row, col) in WALLS {
            cells[row][col] = Cell::Wall;
        }
        Self { cells }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn is_wall(&self, row: usize, col: usize) -> bool {
        self.cell(row, col) == Some(Cell::Wall)
    }

    /// Target of a one-cell step, or None when it leaves the grid or hits a wall.
    pub fn step(&self, from: (usize, usize), direction: Direction) -> Option<(usize, usize)> {
        let (d_row, d_col) = direction.offset();
        let row = from.0.checked_add_signed(d_row)?;
        let col = from.1.checked_add_signed(d_col)?;

        match self.cell(row, col)? {
            Cell::Wall => None,
            _ => Some((row, col)),
        }
    }

    /// Clears every non-wall cell, then paints each active player at its
    /// coordinate. Overlapping players show the higher slot.
    pub fn refresh_markers<'a>(&mut self, players: impl IntoIterator<Item = &'a Player>) {
        for cell in self.cells.iter_mut().flatten() {
            if *cell != Cell::Wall {
                *cell = Cell::Open;
            }
        }

        for player in players.into_iter().filter(|p| p.active) {
            match self.cells.get_mut(player.row).and_then(|r| r.get_mut(player.col)) {
                Some(cell) if *cell != Cell::Wall => *cell = Cell::Occupied(player.slot),
                _ => warn!("Player {} is not on an open cell", player.slot),
            }
        }
    }

    /// One string per row, `GRID_COLS` symbols each.
    pub fn render_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(slot: usize, row: usize, col: usize) -> Player {
        let mut player = Player::spawn(slot);
        player.row = row;
        player.col = col;
        player
    }

    #[test]
    fn test_initial_layout() {
        let grid = Grid::new();
        assert_eq!(
            grid.render_rows(),
            vec![".....", "...#.", "..#..", ".....", "....."]
        );
        assert!(grid.is_wall(2, 2));
        assert!(grid.is_wall(1, 3));
        assert!(!grid.is_wall(0, 0));
        assert_eq!(grid.cell(5, 0), None);
    }

    #[test]
    fn test_step_within_bounds() {
        let grid = Grid::new();
        assert_eq!(grid.step((0, 0), Direction::Down), Some((1, 0)));
        assert_eq!(grid.step((0, 0), Direction::Right), Some((0, 1)));
        assert_eq!(grid.step((4, 4), Direction::Up), Some((3, 4)));
        assert_eq!(grid.step((4, 4), Direction::Left), Some((4, 3)));
    }

    #[test]
    fn test_step_out_of_bounds() {
        let grid = Grid::new();
        assert_eq!(grid.step((0, 0), Direction::Up), None);
        assert_eq!(grid.step((0, 0), Direction::Left), None);
        assert_eq!(grid.step((4, 4), Direction::Down), None);
        assert_eq!(grid.step((4, 4), Direction::Right), None);
    }

    #[test]
    fn test_step_into_wall() {
        let grid = Grid::new();
        assert_eq!(grid.step((2, 1), Direction::Right), None);
        assert_eq!(grid.step((0, 3), Direction::Down), None);
        assert_eq!(grid.step((1, 2), Direction::Right), None);
    }

    #[test]
    fn test_refresh_paints_active_players() {
        let mut grid = Grid::new();
        let players = vec![player(0, 0, 0), player(1, 4, 4)];

        grid.refresh_markers(&players);

        assert_eq!(grid.cell(0, 0), Some(Cell::Occupied(0)));
        assert_eq!(grid.cell(4, 4), Some(Cell::Occupied(1)));
        assert_eq!(grid.render_rows()[0], "A....");
        assert_eq!(grid.render_rows()[4], "....B");
    }

    #[test]
    fn test_refresh_clears_stale_markers() {
        let mut grid = Grid::new();
        let mut players = vec![player(0, 0, 0)];
        grid.refresh_markers(&players);

        players[0].col = 1;
        grid.refresh_markers(&players);
        assert_eq!(grid.render_rows()[0], ".A...");

        players[0].active = false;
        grid.refresh_markers(&players);
        assert_eq!(grid.render_rows()[0], ".....");
    }

    #[test]
    fn test_refresh_keeps_walls() {
        let mut grid = Grid::new();
        grid.refresh_markers(&[player(0, 3, 3)]);
        grid.refresh_markers(&Vec::<Player>::new());

        assert_eq!(grid.cell(2, 2), Some(Cell::Wall));
        assert_eq!(grid.cell(1, 3), Some(Cell::Wall));
        assert_eq!(grid.render_rows()[2], "..#..");
    }

    #[test]
    fn test_overlapping_players_show_higher_slot() {
        let mut grid = Grid::new();
        grid.refresh_markers(&[player(0, 1, 1), player(2, 1, 1)]);
        assert_eq!(grid.cell(1, 1), Some(Cell::Occupied(2)));
    }
}
