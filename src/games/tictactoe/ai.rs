//! Heuristic AI opponent with configurable skill.

use rand::Rng;
use tracing::debug;

use super::types::{Board, Mark, Outcome};

/// Returned when a move is requested on a board with no empty cells.
///
/// Callers are expected to check for a terminal outcome first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoLegalMove;

impl std::fmt::Display for NoLegalMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No legal move available on a full board")
    }
}

impl std::error::Error for NoLegalMove {}

/// Selects a move for `mark` on the given board.
///
/// With probability `skill` (0.0-1.0) the move comes from an ordered
/// decision table; otherwise it is drawn uniformly from the empty cells:
///
/// 1. a move that wins immediately
/// 2. a move that blocks the opponent's immediate win
/// 3. the center cell
/// 4. any corner cell
/// 5. the first remaining empty cell
///
/// # Errors
///
/// Returns [`NoLegalMove`] when the board is full.
pub fn choose_move<R: Rng>(
    board: &Board,
    mark: Mark,
    skill: f64,
    rng: &mut R,
) -> Result<usize, NoLegalMove> {
    let open = board.empty_cells();
    if open.is_empty() {
        return Err(NoLegalMove);
    }

    if rng.gen_range(0.0..1.0) < skill {
        let index = best_move(board, mark, &open);
        debug!(%mark, index, "AI chose tactical move");
        Ok(index)
    } else {
        let index = open[rng.gen_range(0..open.len())];
        debug!(%mark, index, "AI chose random move");
        Ok(index)
    }
}

/// Walks the decision table in priority order. `open` must be non-empty.
fn best_move(board: &Board, mark: Mark, open: &[usize]) -> usize {
    if let Some(index) = winning_move(board, mark, open) {
        return index;
    }
    if let Some(index) = winning_move(board, mark.opponent(), open) {
        return index;
    }
    if open.contains(&4) {
        return 4;
    }
    for corner in [0, 2, 6, 8] {
        if open.contains(&corner) {
            return corner;
        }
    }
    open[0]
}

/// Finds a cell that completes a line for `mark`, if one exists.
fn winning_move(board: &Board, mark: Mark, open: &[usize]) -> Option<usize> {
    open.iter().copied().find(|&index| {
        board
            .place(index, mark)
            .is_ok_and(|next| matches!(next.outcome(), Outcome::Win { .. }))
    })
}
