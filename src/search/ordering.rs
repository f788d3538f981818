//! Move ordering: hash move, winning captures by SEE, killers, quiets by
//! history, then losing captures last. Stronger ordering here prunes far
//! more of the tree than it costs to compute, since alpha-beta's
//! efficiency is dominated by how quickly it finds a refutation.

use crate::basetypes::*;
use crate::chess_move::Move;
use crate::eval::see::see;
use crate::position::Position;
use crate::search::history::HistoryTable;
use crate::search::killers::KillerTable;

const HASH_MOVE_SCORE: i32 = 1_000_000;
const WINNING_CAPTURE_BASE: i32 = 800_000;
const KILLER_SCORE: [i32; 2] = [700_001, 700_000];
const LOSING_CAPTURE_BASE: i32 = -800_000;

pub fn score_move(pos: &Position, m: Move, hash_move: Move, killers: [Move; 2], history: &HistoryTable, ply: usize) -> i32 {
    let _ = ply;
    if m == hash_move {
        return HASH_MOVE_SCORE;
    }
    let is_capture = pos.occupancy() & crate::bitsets::bb(m.to()) != 0 || m.is_en_passant();
    if is_capture {
        let gain = see(pos, m.from(), m.to(), m.move_type().promotion_piece());
        return if gain >= 0 { WINNING_CAPTURE_BASE + gain } else { LOSING_CAPTURE_BASE + gain };
    }
    if m == killers[0] {
        return KILLER_SCORE[0];
    }
    if m == killers[1] {
        return KILLER_SCORE[1];
    }
    let piece_type = pos.piece_at(m.from());
    history.score(piece_type, m)
}

/// Sorts `moves` in place, best-first, by `score_move`.
pub fn order_moves(pos: &Position, moves: &mut [Move], hash_move: Move, killer_table: &KillerTable, history: &HistoryTable, ply: usize) {
    let killers = killer_table.moves(ply);
    let mut scored: Vec<(i32, Move)> = moves.iter().map(|&m| (score_move(pos, m, hash_move, killers, history, ply), m)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    for (slot, (_, m)) in moves.iter_mut().zip(scored) {
        *slot = m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::movegen::{generate_moves, GenKind};

    #[test]
    fn test_hash_move_ranked_first() {
        let pos = Position::start_position();
        let mut moves = Vec::new();
        generate_moves(&pos, GenKind::All, &mut moves);
        let hash_move = moves[10];
        let killers = KillerTable::new();
        let history = HistoryTable::new();
        order_moves(&pos, &mut moves, hash_move, &killers, &history, 0);
        assert_eq!(moves[0], hash_move);
    }

    #[test]
    fn test_winning_capture_ranked_above_quiet() {
        let pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mut moves = Vec::new();
        generate_moves(&pos, GenKind::All, &mut moves);
        let killers = KillerTable::new();
        let history = HistoryTable::new();
        order_moves(&pos, &mut moves, Move::null(), &killers, &history, 0);
        assert!(moves[0].to() == crate::basetypes::D5);
    }
}
