use std::process::exit;
use tabiya::uci;

fn main() {
    exit(match uci::run() {
        Ok(_) => 0,
        Err(_) => 1,
    })
}
