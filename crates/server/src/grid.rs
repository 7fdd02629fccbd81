use gridclash_protocol::GRID_CELLS;

/// The authoritative W×W grid. `0` means unowned; any other byte is a player id
/// truncated to 8 bits for wire transmission (player ids stay well under 256 in
/// practice — see DESIGN.md for the cap this implies).
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<u8>,
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: vec![0u8; GRID_CELLS],
        }
    }

    /// Attempts to claim `cell_index` for `player_id`. Returns `true` if the
    /// cell was unowned and is now owned by `player_id`. Never overwrites an
    /// existing owner (invariant I1).
    pub fn claim(&mut self, cell_index: usize, player_id: u8) -> bool {
        if cell_index >= self.cells.len() {
            return false;
        }
        if self.cells[cell_index] == 0 {
            self.cells[cell_index] = player_id;
            true
        } else {
            false
        }
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Tally of cells owned per nonzero player id, in first-seen order —
    /// the iteration order doubles as the tie-break at game-over.
    pub fn tally(&self) -> Vec<(u8, u16)> {
        let mut order = Vec::new();
        let mut counts: std::collections::HashMap<u8, u16> = std::collections::HashMap::new();
        for &cell in &self.cells {
            if cell == 0 {
                continue;
            }
            if !counts.contains_key(&cell) {
                order.push(cell);
            }
            *counts.entry(cell).or_insert(0) += 1;
        }
        order.into_iter().map(|pid| (pid, counts[&pid])).collect()
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

    #[test]
    fn claim_succeeds_once() {
        let mut grid = Grid::new();
        assert!(grid.claim(0, 1));
        assert!(!grid.claim(0, 2));
        assert_eq!(grid.as_bytes()[0], 1);
    }

    #[test]
    fn out_of_range_claim_is_rejected() {
        let mut grid = Grid::new();
        assert!(!grid.claim(GRID_CELLS, 1));
    }

    #[test]
    fn is_full_detects_complete_grid() {
        let mut grid = Grid::new();
        assert!(!grid.is_full());
        for i in 0..GRID_CELLS {
            grid.claim(i, 1);
        }
        assert!(grid.is_full());
    }

    #[test]
    fn tally_counts_per_player_and_skips_unowned() {
        let mut grid = Grid::new();
        grid.claim(0, 1);
        grid.claim(1, 1);
        grid.claim(2, 2);
        let tally = grid.tally();
        assert_eq!(tally, vec![(1, 2), (2, 1)]);
    }
}
