//! Iterative-deepening negamax search with alpha-beta pruning.
//!
//! The alpha-beta algorithm is an enhancement to plain minimax: it carries
//! two bounds, alpha (the best score the side to move is already assured
//! of) and beta (the best score the opponent is already assured of
//! avoiding), and discards any branch that cannot improve on either.
//!
//! Iterative deepening searches depth 1, then 2, then 3 and so on, keeping
//! only the last completed iteration's result; a move-time budget or a
//! depth limit can stop the process between iterations, and the
//! transposition table carries move-ordering information from each
//! completed depth into the next, which is most of why iterative
//! deepening is faster overall than searching the final depth directly.
//!
//! The teacher's own searcher (`AlphabetaSearcher`/`DeepeningSearcher`/
//! `AspirationSearcher`, in `threading.rs` and this module) is a
//! multi-threaded pipeline: a dedicated OS thread per searcher stage,
//! wired together with `mpsc` channels and a `Condvar` for the "reports
//! ready" signal. That architecture solves a problem this crate doesn't
//! have (several concurrent searches feeding a multi-PV aggregator), so it
//! is not carried over; this module is a single call stack, cancelled
//! cooperatively by checking an `AtomicBool` every node, which is the
//! simplest thing that satisfies a UCI `stop` command.

pub mod history;
pub mod killers;
pub mod ordering;
pub mod tt;

use crate::basetypes::*;
use crate::chess_move::Move;
use crate::eval::evaluate;
use crate::position::movegen::{self, GenKind};
use crate::position::Position;
use history::HistoryTable;
use killers::KillerTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tt::{Bound, Tt};

pub const MAX_DEPTH: u8 = 63;
const NULL_MOVE_REDUCTION: i8 = 3;
/// Indexed by depth; only consulted at depth 1 or 2 (see `futility_allowed`).
const FUTILITY_MARGIN: [i32; 3] = [0, 300, 500];
const DELTA_MARGIN: i32 = 200;
/// From this ply onward, a late move reduction drops two plies instead of one.
const LMR_DEEP_PLY: u16 = 6;

/// Raised internally whenever the cooperative stop flag is observed mid
/// search; propagated with `?` instead of threaded through every return
/// path by hand.
#[derive(Debug)]
pub struct SearchCancelled;

pub type SearchOutcome<T> = Result<T, SearchCancelled>;

#[derive(Clone, Default)]
pub struct SearchLimits {
    pub depth: Option<u8>,
    pub move_time: Option<Duration>,
    pub nodes: Option<u64>,
    pub infinite: bool,
}

#[derive(Clone)]
pub struct SearchResult {
    pub best_move: Move,
    pub score: Value,
    pub depth: u8,
    pub nodes: NodeCount,
    pub pv: Vec<Move>,
}

pub struct Tables<'a> {
    pub tt: &'a mut Tt,
    pub killers: &'a mut KillerTable,
    pub history: &'a mut HistoryTable,
}

struct Search<'a> {
    tt: &'a mut Tt,
    killers: &'a mut KillerTable,
    history: &'a mut HistoryTable,
    stop: &'a AtomicBool,
    start: Instant,
    move_time: Option<Duration>,
    node_limit: Option<u64>,
    nodes: u64,
    check_counter: u32,
    /// Hashes of every position from the start of the game up to and
    /// including the current node, in ply order. Checked at stride 2 for
    /// threefold repetition; grown on `make` and shrunk on `unmake` as the
    /// search descends and backs up.
    path: Vec<u64>,
    /// Each root move's score from the previous completed iteration, used
    /// to search the most promising moves first this iteration.
    root_scores: Vec<(Move, i32)>,
}

/// True if `hash` (assumed to be `path`'s last entry) occurs at least three
/// times in `path` when walked backwards two plies at a time, i.e. among
/// positions where the same side was to move.
fn is_threefold_repetition(path: &[u64], hash: u64) -> bool {
    if path.is_empty() {
        return false;
    }
    let mut count = 0;
    let mut i = path.len() - 1;
    loop {
        if path[i] == hash {
            count += 1;
            if count >= 3 {
                return true;
            }
        }
        if i < 2 {
            break;
        }
        i -= 2;
    }
    false
}

impl<'a> Search<'a> {
    fn check_time(&mut self) -> SearchOutcome<()> {
        self.check_counter += 1;
        if self.check_counter & 0xfff != 0 {
            return Ok(());
        }
        if self.stop.load(Ordering::Relaxed) {
            return Err(SearchCancelled);
        }
        if let Some(limit) = self.node_limit {
            if self.nodes >= limit {
                return Err(SearchCancelled);
            }
        }
        if let Some(budget) = self.move_time {
            if self.start.elapsed() >= budget {
                return Err(SearchCancelled);
            }
        }
        Ok(())
    }
}

fn is_in_check(pos: &Position) -> bool {
    let king_sq = movegen::my_king_square(pos);
    movegen::attackers_to(pos, king_sq, pos.occupancy(), false) != 0
}

/// Runs iterative deepening until `limits` is exhausted or `stop` is set,
/// calling `on_iteration` after each completed depth. Returns the best
/// result obtained from the last fully completed iteration. If `stop` is
/// already set, or the first iteration cannot complete, the returned
/// result has `depth == 0` and `best_move` is the null move.
///
/// `game_history` holds the hash of every position played so far this game,
/// ending with `pos`'s own hash; it seeds threefold-repetition detection so
/// a repetition that started before the search began is still caught.
pub fn iterative_deepening(
    pos: &mut Position,
    tables: Tables,
    limits: &SearchLimits,
    stop: &AtomicBool,
    game_history: &[u64],
    mut on_iteration: impl FnMut(&SearchResult),
) -> SearchResult {
    let Tables { tt, killers, history } = tables;
    let path = if game_history.is_empty() { vec![pos.hash()] } else { game_history.to_vec() };
    let mut search = Search {
        tt,
        killers,
        history,
        stop,
        start: Instant::now(),
        move_time: limits.move_time,
        node_limit: limits.nodes,
        nodes: 0,
        check_counter: 0,
        path,
        root_scores: Vec::new(),
    };

    let mut best = SearchResult { best_move: Move::null(), score: 0, depth: 0, nodes: 0, pv: Vec::new() };
    let max_depth = limits.depth.unwrap_or(MAX_DEPTH).min(MAX_DEPTH);

    for depth in 1..=max_depth {
        search.tt.new_generation();
        match negamax_root(pos, &mut search, depth as i8) {
            Ok((score, best_move)) => {
                let pv = extract_pv(pos, search.tt, depth);
                best = SearchResult { best_move, score, depth, nodes: search.nodes, pv };
                on_iteration(&best);
                if score.abs() >= VALUE_EVAL_MAX - MAX_MATE_PLIES {
                    break;
                }
            }
            Err(SearchCancelled) => break,
        }
        if !limits.infinite {
            if let Some(budget) = limits.move_time {
                if search.start.elapsed() >= budget {
                    break;
                }
            }
        }
    }
    best.nodes = search.nodes;
    best
}

fn negamax_root(pos: &mut Position, search: &mut Search, depth: i8) -> SearchOutcome<(Value, Move)> {
    let mut moves = Vec::new();
    movegen::generate_moves(pos, GenKind::All, &mut moves);
    if moves.is_empty() {
        return Ok((if is_in_check(pos) { VALUE_EVAL_MIN } else { 0 }, Move::null()));
    }

    let hash_move = search.tt.probe(pos.hash()).map(|p| p.best_move).unwrap_or_else(Move::null);
    ordering::order_moves(pos, &mut moves, hash_move, &*search.killers, &*search.history, 0);
    // Re-sort by the previous iteration's scores, falling back to the
    // heuristic order above for moves that weren't scored yet.
    let prior = &search.root_scores;
    moves.sort_by_key(|m| std::cmp::Reverse(prior.iter().find(|(mv, _)| mv == m).map(|&(_, s)| s).unwrap_or(i32::MIN)));

    let mut alpha = VALUE_MIN as i32;
    let beta = VALUE_MAX as i32;
    let mut best_move = moves[0];
    let mut scores = Vec::with_capacity(moves.len());

    for (move_index, &m) in moves.iter().enumerate() {
        let undo = pos.make(m);
        search.path.push(pos.hash());
        search.nodes += 1;

        let value = if move_index == 0 {
            -negamax(pos, search, depth - 1, -beta, -alpha, 1, false)?
        } else {
            let scout = -negamax(pos, search, depth - 1, -alpha - 1, -alpha, 1, false)?;
            if scout > alpha {
                -negamax(pos, search, depth - 1, -beta, -alpha, 1, false)?
            } else {
                scout
            }
        };

        search.path.pop();
        pos.unmake(undo);

        scores.push((m, value));
        if value > alpha {
            alpha = value;
            best_move = m;
        }
    }

    search.root_scores = scores;
    search.tt.store(pos.hash(), best_move, alpha as Value, depth, Bound::Exact);
    Ok((alpha as Value, best_move))
}

fn negamax(
    pos: &mut Position,
    search: &mut Search,
    depth: i8,
    mut alpha: i32,
    beta: i32,
    ply: u16,
    null_branch: bool,
) -> SearchOutcome<i32> {
    search.check_time()?;
    let pv_node = beta - alpha > 1;

    if pos.halfmove_clock() >= 50 || pos.is_insufficient_material() {
        return Ok(0);
    }
    if is_threefold_repetition(&search.path, pos.hash()) {
        return Ok(0);
    }

    if depth <= 0 {
        return quiescence(pos, search, alpha, beta, ply);
    }
    let mut depth = depth;

    let hash = pos.hash();
    let mut hash_move = Move::null();
    if let Some(probe) = search.tt.probe(hash) {
        hash_move = probe.best_move;
        if probe.depth as i8 >= depth {
            match probe.bound {
                Bound::Exact => return Ok(probe.value as i32),
                Bound::LowerBound if probe.value as i32 >= beta => return Ok(probe.value as i32),
                Bound::UpperBound if (probe.value as i32) <= alpha => return Ok(probe.value as i32),
                _ => {}
            }
        }
    }

    let in_check = is_in_check(pos);

    // Null-move pruning: skip our move entirely and see if the opponent is
    // still in trouble even with a free tempo. Restricted to non-PV, non-
    // null-branch nodes (two null moves in a row prove nothing); disabled in
    // check (no legal null move exists) and with only king and pawns left,
    // where zugzwang makes a free pass an unreliable signal.
    let non_pawn_material = pos.occupancy() & !pos.pawns() & !pos.kings() & pos.side_to_move;
    if !pv_node && !null_branch && !in_check && depth >= 3 && non_pawn_material != 0 {
        let (prev_meta, prev_hash) = pos.do_null();
        let result = negamax(pos, search, depth - NULL_MOVE_REDUCTION, -beta, -beta + 1, ply + 1, true);
        pos.undo_null(prev_meta, prev_hash);
        let score = -result?;
        if score >= beta {
            return Ok(beta);
        }
    }

    // Check extension: a position left in check is searched one ply deeper
    // than a quiet one, since checks can't safely be left unresolved.
    if in_check {
        depth += 1;
    }

    let mut moves = Vec::new();
    movegen::generate_moves(pos, GenKind::All, &mut moves);
    if moves.is_empty() {
        return Ok(if in_check { VALUE_EVAL_MIN as i32 + ply as i32 } else { 0 });
    }

    ordering::order_moves(pos, &mut moves, hash_move, &*search.killers, &*search.history, ply as usize);

    let static_eval = if in_check { VALUE_MIN as i32 } else { evaluate(pos) as i32 };
    let futility_allowed = !in_check && (depth == 1 || depth == 2);
    let futility_margin = FUTILITY_MARGIN.get(depth as usize).copied().unwrap_or(i32::MAX);

    let mut best_move = moves[0];
    let mut best_value = VALUE_MIN as i32;
    let mut bound = Bound::UpperBound;
    let mut searched_quiets: Vec<(PieceType, Move)> = Vec::new();

    for (move_index, &m) in moves.iter().enumerate() {
        let is_capture = pos.occupancy() & crate::bitsets::bb(m.to()) != 0 || m.is_en_passant();

        if futility_allowed && move_index > 0 && !is_capture && !m.is_promotion() && static_eval + futility_margin <= alpha {
            continue;
        }

        let piece_type = pos.piece_at(m.from());
        let undo = pos.make(m);
        search.path.push(pos.hash());
        search.nodes += 1;

        let is_killer = search.killers.is_killer(ply as usize, m);
        let reduction: i8 = if !pv_node
            && depth >= 3
            && move_index >= 4
            && !is_capture
            && !m.is_promotion()
            && !in_check
            && !is_killer
        {
            if ply >= LMR_DEEP_PLY {
                2
            } else {
                1
            }
        } else {
            0
        };

        let mut value = if move_index == 0 {
            -negamax(pos, search, depth - 1, -beta, -alpha, ply + 1, false)?
        } else {
            let reduced = -negamax(pos, search, depth - 1 - reduction, -alpha - 1, -alpha, ply + 1, false)?;
            if reduced > alpha && reduced < beta {
                -negamax(pos, search, depth - 1, -beta, -alpha, ply + 1, false)?
            } else {
                reduced
            }
        };
        if move_index > 0 && reduction > 0 && value > alpha {
            value = -negamax(pos, search, depth - 1, -beta, -alpha, ply + 1, false)?;
        }

        search.path.pop();
        pos.unmake(undo);

        if value > best_value {
            best_value = value;
            best_move = m;
        }
        if value > alpha {
            alpha = value;
            bound = Bound::Exact;
        }
        if alpha >= beta {
            if !is_capture {
                search.killers.record(ply as usize, m);
                search.history.update(piece_type, m, &searched_quiets, depth);
            }
            bound = Bound::LowerBound;
            best_value = alpha;
            break;
        }
        if !is_capture {
            searched_quiets.push((piece_type, m));
        }
    }

    search.tt.store(hash, best_move, best_value as Value, depth, bound);
    Ok(best_value)
}

fn quiescence(pos: &mut Position, search: &mut Search, mut alpha: i32, beta: i32, ply: u16) -> SearchOutcome<i32> {
    search.check_time()?;

    let in_check = is_in_check(pos);
    let mut moves = Vec::new();

    if in_check {
        movegen::generate_moves(pos, GenKind::All, &mut moves);
        if moves.is_empty() {
            return Ok(VALUE_EVAL_MIN as i32 + ply as i32);
        }
    } else {
        let stand_pat = evaluate(pos) as i32;
        if stand_pat >= beta {
            return Ok(stand_pat);
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        movegen::generate_moves(pos, GenKind::Captures, &mut moves);
    }

    ordering::order_moves(pos, &mut moves, Move::null(), &*search.killers, &*search.history, 0);

    for &m in &moves {
        if !in_check {
            let gain = crate::eval::see::see(pos, m.from(), m.to(), m.move_type().promotion_piece());
            if gain < 0 {
                continue;
            }
            let stand_pat = evaluate(pos) as i32;
            if stand_pat + gain + DELTA_MARGIN < alpha {
                continue;
            }
        }
        let undo = pos.make(m);
        search.nodes += 1;
        let value = -quiescence(pos, search, -beta, -alpha, ply + 1)?;
        pos.unmake(undo);

        if value >= beta {
            return Ok(beta);
        }
        if value > alpha {
            alpha = value;
        }
    }
    Ok(alpha)
}

/// Walks the transposition table from `pos` following each position's
/// stored best move, up to `max_len` plies, to reconstruct the principal
/// variation. Does not mutate `pos`.
pub fn extract_pv(pos: &Position, tt: &Tt, max_len: u8) -> Vec<Move> {
    let mut pv = Vec::new();
    let mut scratch = pos.clone();
    for _ in 0..max_len {
        let probe = match tt.probe(scratch.hash()) {
            Some(p) if !p.best_move.is_null() => p,
            _ => break,
        };
        let mut legal = Vec::new();
        movegen::generate_moves(&scratch, GenKind::All, &mut legal);
        if !legal.contains(&probe.best_move) {
            break;
        }
        pv.push(probe.best_move);
        scratch.make(probe.best_move);
    }
    pv
}
