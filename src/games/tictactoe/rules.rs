//! Move application and outcome detection.

use super::types::{Board, Cell, Mark, Outcome};

/// The 8 canonical winning lines: 3 rows, 3 columns, 2 diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Errors that can occur when placing a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// The target cell already holds a mark.
    CellOccupied(usize),
    /// The index is outside 0-8.
    OutOfBounds(usize),
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardError::CellOccupied(i) => write!(f, "Cell {} is already occupied", i),
            BoardError::OutOfBounds(i) => write!(f, "Position {} is out of bounds (must be 0-8)", i),
        }
    }
}

impl std::error::Error for BoardError {}

impl Board {
    /// Returns a new board with `mark` placed at `index`.
    ///
    /// The receiver is never mutated; the returned board differs from it
    /// only at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::OutOfBounds`] for indices past 8 and
    /// [`BoardError::CellOccupied`] when the cell is already taken.
    pub fn place(&self, index: usize, mark: Mark) -> Result<Board, BoardError> {
        if index >= 9 {
            return Err(BoardError::OutOfBounds(index));
        }
        if !self.is_empty(index) {
            return Err(BoardError::CellOccupied(index));
        }

        let mut next = self.clone();
        next.set(index, Cell::Taken(mark));
        Ok(next)
    }

    /// Inspects the board for a win or draw.
    ///
    /// Deterministic and side-effect free; calling it repeatedly on the
    /// same board always yields the same outcome.
    pub fn outcome(&self) -> Outcome {
        for line in LINES {
            let [a, b, c] = line;
            if let Some(Cell::Taken(mark)) = self.get(a)
                && self.get(b) == Some(Cell::Taken(mark))
                && self.get(c) == Some(Cell::Taken(mark))
            {
                return Outcome::Win { mark, line };
            }
        }

        if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::Open
        }
    }
}
