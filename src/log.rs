//! Diagnostic logging, kept off the UCI wire.
//!
//! A UCI engine's stdout is a protocol channel a GUI parses line by line;
//! anything printed there that isn't a UCI message corrupts the session.
//! Grounded on the teacher's own convention of keeping protocol output and
//! diagnostics on separate channels (`uci::run_server`'s line loop never
//! interleaves debug prints into stdout); this module gives that convention
//! a name instead of reaching for a new dependency, since the teacher
//! predates `log`/`tracing` adoption.

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        eprintln!("[warn] {}", format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        eprintln!("[info] {}", format!($($arg)*))
    };
}
