//! End-to-end UCI protocol scenarios, driving the built binary as a
//! subprocess over stdio.
//!
//! Grounded on `menezesd-ChessEngine/tests/uci_integration.rs`'s
//! spawn-binary-and-pipe-commands shape.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

struct Session {
    child: Child,
    stdin: ChildStdin,
    lines: std::sync::mpsc::Receiver<String>,
}

impl Session {
    fn start() -> Session {
        let exe = env!("CARGO_BIN_EXE_tabiya");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("failed to spawn engine binary");
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().flatten() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Session { child, stdin, lines: rx }
    }

    fn send(&mut self, line: &str) {
        writeln!(self.stdin, "{}", line).unwrap();
    }

    /// Collects lines until `predicate` matches one, or `timeout` elapses.
    fn wait_for(&self, timeout: Duration, predicate: impl Fn(&str) -> bool) -> Option<String> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(line) = self.lines.recv_timeout(Duration::from_millis(50)) {
                if predicate(&line) {
                    return Some(line);
                }
            }
        }
        None
    }

    fn quit(mut self) {
        self.send("quit");
        let _ = self.child.wait();
    }
}

#[test]
fn test_uci_handshake() {
    let mut session = Session::start();
    session.send("uci");
    let got_uciok = session.wait_for(Duration::from_secs(2), |l| l == "uciok");
    assert!(got_uciok.is_some(), "expected uciok");
    session.send("isready");
    let got_readyok = session.wait_for(Duration::from_secs(2), |l| l == "readyok");
    assert!(got_readyok.is_some(), "expected readyok");
    session.quit();
}

#[test]
fn test_go_depth_one_from_startpos_returns_a_reasonable_opening_move() {
    const REASONABLE: &[&str] = &[
        "a2a3", "a2a4", "b1a3", "b1c3", "b2b3", "b2b4", "c2c3", "c2c4", "d2d3", "d2d4", "e2e3",
        "e2e4", "f2f3", "f2f4", "g1f3", "g1h3", "g2g3", "g2g4", "h2h3", "h2h4",
    ];
    let mut session = Session::start();
    session.send("uci");
    session.wait_for(Duration::from_secs(2), |l| l == "uciok");
    session.send("position startpos");
    session.send("go depth 1");
    let bestmove = session
        .wait_for(Duration::from_secs(5), |l| l.starts_with("bestmove"))
        .expect("expected a bestmove line");
    let mv = bestmove.split_whitespace().nth(1).unwrap();
    assert!(REASONABLE.contains(&mv), "unexpected opening move: {}", mv);
    session.quit();
}

#[test]
fn test_mate_in_one_is_found() {
    let mut session = Session::start();
    session.send("uci");
    session.wait_for(Duration::from_secs(2), |l| l == "uciok");
    session.send("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    session.send("go depth 2");
    let bestmove = session
        .wait_for(Duration::from_secs(5), |l| l.starts_with("bestmove"))
        .expect("expected a bestmove line");
    assert_eq!(bestmove.trim(), "bestmove a1a8");
    session.quit();
}

#[test]
fn test_perft_via_go_command_sums_to_kiwipete_depth_3() {
    let mut session = Session::start();
    session.send("uci");
    session.wait_for(Duration::from_secs(2), |l| l == "uciok");
    session.send("position fen r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    session.send("go perft 3");
    let total_line = session
        .wait_for(Duration::from_secs(10), |l| l.starts_with("total:"))
        .expect("expected a total line");
    let total: u64 = total_line.split(':').nth(1).unwrap().trim().parse().unwrap();
    assert_eq!(total, 97862);
    session.quit();
}

#[test]
fn test_movetime_returns_within_deadline() {
    let mut session = Session::start();
    session.send("uci");
    session.wait_for(Duration::from_secs(2), |l| l == "uciok");
    session.send("position startpos");
    let started = Instant::now();
    session.send("go movetime 50");
    let bestmove = session
        .wait_for(Duration::from_millis(500), |l| l.starts_with("bestmove"))
        .expect("expected a bestmove line within the movetime budget");
    assert!(started.elapsed() < Duration::from_millis(500));
    let mv = bestmove.split_whitespace().nth(1).unwrap();
    assert_ne!(mv, "0000");
    session.quit();
}
