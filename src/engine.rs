//! Owns the engine's persistent state (transposition table, move-ordering
//! heuristics, options) across UCI commands, and dispatches each command
//! to the position/search layer.
//!
//! Grounded on the teacher's `UciEngine` trait (`En-En-Code-alcibiades/src/
//! uci.rs`), which separates "the thing holding engine state" from "the
//! thing speaking the UCI wire protocol". This module plays the
//! `UciEngine` role; `uci` plays the protocol role. The teacher's engine
//! methods are non-blocking and report back over a channel from a
//! searcher thread pool; here a single background thread runs the search
//! and is told to stop through `AtomicBool`, per the simplified
//! concurrency model this crate uses (see `search` module docs).

use crate::chess_move::Move;
use crate::position::Position;
use crate::search::history::HistoryTable;
use crate::search::killers::KillerTable;
use crate::search::tt::Tt;
use crate::search::{self, SearchLimits, SearchResult, Tables};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DEFAULT_HASH_MB: usize = 16;
const MIN_HASH_MB: usize = 1;
const MAX_HASH_MB: usize = 4096;

#[derive(Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions { hash_mb: DEFAULT_HASH_MB }
    }
}

struct EngineState {
    tt: Tt,
    killers: KillerTable,
    history: HistoryTable,
}

pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    options: EngineOptions,
    position: Position,
    /// Hash of every position played so far this game, ending with
    /// `position`'s own hash, for threefold-repetition detection.
    history: Vec<u64>,
    stop: Arc<AtomicBool>,
    search_thread: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Engine {
        let position = Position::start_position();
        let game_history = vec![position.hash()];
        Engine {
            state: Arc::new(Mutex::new(EngineState {
                tt: Tt::new(options.hash_mb),
                killers: KillerTable::new(),
                history: HistoryTable::new(),
            })),
            options,
            position,
            history: game_history,
            stop: Arc::new(AtomicBool::new(false)),
            search_thread: None,
        }
    }

    pub fn set_hash_size_mb(&mut self, requested_mb: usize) {
        let size_mb = requested_mb.clamp(MIN_HASH_MB, MAX_HASH_MB);
        if size_mb != requested_mb {
            crate::log_warn!("Hash size {} MB clamped to {} MB", requested_mb, size_mb);
        }
        self.options.hash_mb = size_mb;
        self.wait_for_search();
        let mut state = self.state.lock().unwrap();
        state.tt = Tt::new(size_mb);
    }

    /// Clears all persistent state for the start of a new game.
    pub fn new_game(&mut self) {
        self.wait_for_search();
        let mut state = self.state.lock().unwrap();
        state.tt.clear();
        state.killers.clear();
        state.history.clear();
    }

    /// Sets the current position along with the hash of every position
    /// played so far this game (ending with `pos`'s own hash). Pass an
    /// empty slice if no earlier history is known (e.g. a bare `position
    /// fen ...` with no preceding moves).
    pub fn set_position(&mut self, pos: Position, game_history: &[u64]) {
        self.wait_for_search();
        self.history = if game_history.is_empty() { vec![pos.hash()] } else { game_history.to_vec() };
        self.position = pos;
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Starts a search in a background thread, calling `on_info` from that
    /// thread after every completed iteration and `on_best_move` once at
    /// the end. Blocks only long enough to hand the position off.
    pub fn go(
        &mut self,
        limits: SearchLimits,
        on_info: impl Fn(&SearchResult) + Send + 'static,
        on_best_move: impl FnOnce(Move) + Send + 'static,
    ) {
        self.wait_for_search();
        self.stop.store(false, Ordering::Relaxed);

        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop);
        let mut pos = self.position.clone();
        let game_history = self.history.clone();

        self.search_thread = Some(thread::spawn(move || {
            let mut guard = state.lock().unwrap();
            let EngineState { tt, killers, history } = &mut *guard;
            let result = search::iterative_deepening(
                &mut pos,
                Tables { tt, killers, history },
                &limits,
                &stop,
                &game_history,
                |partial| on_info(partial),
            );
            on_best_move(result.best_move);
        }));
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_searching(&self) -> bool {
        self.search_thread.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn wait_for_search(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
        self.stop.store(false, Ordering::Relaxed);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.wait_for_search();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_go_reports_best_move() {
        let mut engine = Engine::new();
        engine.set_position(Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap(), &[]);
        let (tx, rx) = channel();
        let limits = SearchLimits { depth: Some(3), ..SearchLimits::default() };
        engine.go(limits, |_| {}, move |best| tx.send(best).unwrap());
        let best = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!((best.from(), best.to()), (crate::basetypes::A1, crate::basetypes::A8));
    }

    #[test]
    fn test_new_game_clears_tables() {
        let mut engine = Engine::new();
        engine.new_game();
        assert!(!engine.is_searching());
    }
}
