//! UCI protocol adapter: translates the line-oriented GUI protocol to and
//! from `engine::Engine` calls.
//!
//! Grounded on `En-En-Code-alcibiades/src/uci.rs`'s `Server`/`parse_uci_command`
//! pair (a fork of the same project lineage as this crate's base), which
//! tokenizes commands with `regex` and drives a `UciEngine` implementor.
//! That version runs the engine on a pool of searcher threads and polls
//! for replies with `wait_for_reply`; here `Engine::go` already owns its
//! background thread and reports back through plain callbacks, so the
//! server loop collapses to "read a line, dispatch it, let the callbacks
//! print".

use crate::chess_move::Move;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::position::movegen::{generate_moves, GenKind};
use crate::position::Position;
use crate::search::SearchLimits;
use regex::Regex;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

const ENGINE_NAME: &str = "tabiya";
const ENGINE_AUTHOR: &str = "tabiya contributors";

/// Blocks the current thread, serving UCI commands from stdin until
/// "quit" is received or stdin closes.
pub fn run() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut engine = Engine::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "uci" => {
                writeln!(stdout, "id name {}", ENGINE_NAME)?;
                writeln!(stdout, "id author {}", ENGINE_AUTHOR)?;
                writeln!(stdout, "option name Hash type spin default 16 min 1 max 4096")?;
                writeln!(stdout, "uciok")?;
                stdout.flush()?;
            }
            "isready" => {
                writeln!(stdout, "readyok")?;
                stdout.flush()?;
            }
            "ucinewgame" => engine.new_game(),
            "stop" => engine.stop(),
            "ponderhit" => {}
            "quit" => break,
            _ => {
                if let Some(rest) = line.strip_prefix("setoption ") {
                    handle_setoption(&mut engine, rest);
                } else if let Some(rest) = line.strip_prefix("position ") {
                    handle_position(&mut engine, rest);
                } else if let Some(rest) = line.strip_prefix("go") {
                    handle_go(&mut engine, rest.trim_start());
                }
                // Unrecognized input is ignored, per the UCI convention
                // that a GUI may send commands an engine doesn't support.
            }
        }
    }
    engine.wait_for_search();
    Ok(())
}

fn handle_setoption(engine: &mut Engine, rest: &str) {
    lazy_static::lazy_static! {
        static ref RE: Regex = Regex::new(r"^name\s+(\S.*?)(?:\s+value\s+(.*?))?\s*$").unwrap();
    }
    let Some(caps) = RE.captures(rest) else { return };
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if name.eq_ignore_ascii_case("hash") {
        if let Ok(mb) = value.parse::<usize>() {
            engine.set_hash_size_mb(mb);
        }
    }
}

fn handle_position(engine: &mut Engine, rest: &str) {
    const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let (board_part, moves_part) = match rest.find("moves") {
        Some(idx) => (rest[..idx].trim(), rest[idx + "moves".len()..].trim()),
        None => (rest.trim(), ""),
    };
    let fen = if let Some(fen) = board_part.strip_prefix("fen ") {
        fen.trim()
    } else if board_part.starts_with("startpos") {
        STARTPOS_FEN
    } else {
        return;
    };
    let mut pos = match Position::from_fen(fen) {
        Ok(pos) => pos,
        Err(e) => {
            crate::log_warn!("{}", EngineError::from(e));
            return;
        }
    };
    let mut game_history = vec![pos.hash()];
    for uci_move in moves_part.split_whitespace() {
        if let Err(e) = apply_uci_move(&mut pos, uci_move) {
            crate::log_warn!("{}", e);
            break;
        }
        game_history.push(pos.hash());
    }
    engine.set_position(pos, &game_history);
}

/// Resolves a coordinate-notation move (`e2e4`, `e7e8q`) against `pos`'s
/// legal moves and plays it, or reports why it isn't legal.
fn apply_uci_move(pos: &mut Position, uci_move: &str) -> Result<(), EngineError> {
    let (physical_from, physical_to, promo) = Move::parse_uci_squares(uci_move)
        .ok_or_else(|| EngineError::IllegalMove(uci_move.to_string()))?;
    let flip = !pos.is_white_to_move();
    let from = if flip { physical_from ^ 56 } else { physical_from };
    let to = if flip { physical_to ^ 56 } else { physical_to };

    let mut moves = Vec::new();
    generate_moves(pos, GenKind::All, &mut moves);
    let m = moves
        .into_iter()
        .find(|m| m.from() == from && m.to() == to && m.move_type().promotion_piece() == promo)
        .ok_or_else(|| EngineError::IllegalMove(uci_move.to_string()))?;
    pos.make(m);
    Ok(())
}

fn handle_go(engine: &mut Engine, rest: &str) {
    lazy_static::lazy_static! {
        static ref PERFT_RE: Regex = Regex::new(r"\bperft\s+(\d+)").unwrap();
        static ref RE: Regex =
            Regex::new(r"\b(wtime|btime|winc|binc|movestogo|depth|nodes|mate|movetime|infinite|ponder)(?:\s+(\d+))?").unwrap();
    }
    if let Some(caps) = PERFT_RE.captures(rest) {
        if let Ok(depth) = caps[1].parse::<u32>() {
            let mut pos = engine.position().clone();
            crate::position::perft::perft_divide(&mut pos, depth);
        }
        return;
    }

    let mut limits = SearchLimits::default();
    let mut wtime = None;
    let mut btime = None;
    let mut winc = Duration::ZERO;
    let mut binc = Duration::ZERO;
    let white_to_move = engine.position().is_white_to_move();

    for caps in RE.captures_iter(rest) {
        let keyword = caps.get(1).unwrap().as_str();
        let number: u64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        match keyword {
            "depth" => limits.depth = Some(number.min(crate::search::MAX_DEPTH as u64) as u8),
            "nodes" => limits.nodes = Some(number),
            "movetime" => limits.move_time = Some(Duration::from_millis(number)),
            "infinite" => limits.infinite = true,
            "wtime" => wtime = Some(Duration::from_millis(number)),
            "btime" => btime = Some(Duration::from_millis(number)),
            "winc" => winc = Duration::from_millis(number),
            "binc" => binc = Duration::from_millis(number),
            _ => {}
        }
    }

    if limits.move_time.is_none() && !limits.infinite && limits.depth.is_none() {
        let (remaining, inc) = if white_to_move { (wtime, winc) } else { (btime, binc) };
        if let Some(remaining) = remaining {
            limits.move_time = Some(allocate_move_time(remaining, inc));
        }
    }

    let start = Instant::now();
    engine.go(
        limits,
        move |result| report_info(result, white_to_move, start),
        move |best_move| report_best_move(best_move, white_to_move),
    );
}

/// A fixed fraction of the remaining clock plus the increment, following
/// the teacher's `Deepening` searcher's convention of never spending more
/// than a modest slice of the clock on a single move.
fn allocate_move_time(remaining: Duration, inc: Duration) -> Duration {
    let share = remaining / 30 + inc;
    let ceiling = remaining.saturating_sub(Duration::from_millis(50));
    share.min(ceiling).max(Duration::from_millis(1))
}

fn report_info(result: &crate::search::SearchResult, white_to_move: bool, start: Instant) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let elapsed_ms = start.elapsed().as_millis().max(1) as u64;
    let nps = result.nodes * 1000 / elapsed_ms;
    let _ = write!(
        out,
        "info depth {} score cp {} time {} nodes {} nps {}",
        result.depth, result.score, elapsed_ms, result.nodes, nps
    );
    if !result.pv.is_empty() {
        let _ = write!(out, " pv");
        let mut white_to_move = white_to_move;
        for &m in &result.pv {
            let _ = write!(out, " {}", format_move(m, white_to_move));
            white_to_move = !white_to_move;
        }
    }
    let _ = writeln!(out);
    let _ = out.flush();
}

fn report_best_move(best_move: Move, white_to_move: bool) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = writeln!(out, "bestmove {}", format_move(best_move, white_to_move));
    let _ = out.flush();
}

fn format_move(m: Move, white_to_move: bool) -> String {
    let flip = !white_to_move;
    let from = if flip { m.from() ^ 56 } else { m.from() };
    let to = if flip { m.to() ^ 56 } else { m.to() };
    Move::to_uci_string(from, to, m.move_type().promotion_piece())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_uci_move_plays_legal_move() {
        let mut pos = Position::start_position();
        assert!(apply_uci_move(&mut pos, "e2e4").is_ok());
        assert!(!pos.is_white_to_move());
    }

    #[test]
    fn test_apply_uci_move_rejects_illegal_move() {
        let mut pos = Position::start_position();
        let err = apply_uci_move(&mut pos, "e2e5").unwrap_err();
        assert!(matches!(err, EngineError::IllegalMove(_)));
    }

    #[test]
    fn test_format_move_round_trips_through_flip() {
        let m = Move::new_quiet(crate::basetypes::E2, crate::basetypes::E4);
        assert_eq!(format_move(m, true), "e2e4");
    }
}
