//! Zobrist hash key tables, generated once from a fixed seed so that
//! repeated runs of the engine hash identical positions identically.
//!
//! Grounded on the teacher's `ZobristArrays`, which used a `rand::Isaac64Rng`
//! seeded with a literal array and `std::sync::{Once, ONCE_INIT}` for lazy
//! one-time initialization. `ONCE_INIT` and `Isaac64Rng` are both gone from
//! current `rand`/std; this rewrite uses `rand::rngs::StdRng` seeded the same
//! deterministic way and `lazy_static!`, which the teacher's own `Cargo.toml`
//! already depends on for exactly this kind of singleton.

use crate::basetypes::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub struct ZobristKeys {
    /// Indexed by [color][piece_type][square]. `piece_type` 0 is unused.
    pub pieces: [[[u64; 64]; 7]; 2],
    pub side_to_move: u64,
    /// One key per of the four castling rights, in the order
    /// white-king, white-queen, black-king, black-queen.
    pub castling: [u64; 4],
    /// One key per file, used when an en-passant capture is possible on it.
    pub en_passant_file: [u64; 8],
}

lazy_static::lazy_static! {
    pub static ref ZOBRIST: ZobristKeys = ZobristKeys::create();
}

impl ZobristKeys {
    fn create() -> ZobristKeys {
        let seed: [u8; 32] = [
            0x9e, 0x37, 0x79, 0xb9, 0x7f, 0x4a, 0x7c, 0x15, 0xf3, 0x9c, 0xc0, 0x60, 0x5c, 0xed,
            0xc8, 0x34, 0x2b, 0x79, 0x8b, 0x6a, 0x1c, 0x86, 0x5e, 0x2f, 0x41, 0xe9, 0x22, 0x74,
            0x6d, 0xe4, 0x5a, 0x11,
        ];
        let mut rng = StdRng::from_seed(seed);

        let mut pieces = [[[0u64; 64]; 7]; 2];
        for color in pieces.iter_mut() {
            for piece_slice in color.iter_mut().skip(1) {
                for key in piece_slice.iter_mut() {
                    *key = rng.next_u64();
                }
            }
        }

        let side_to_move = rng.next_u64();

        let mut castling = [0u64; 4];
        for key in castling.iter_mut() {
            *key = rng.next_u64();
        }

        let mut en_passant_file = [0u64; 8];
        for key in en_passant_file.iter_mut() {
            *key = rng.next_u64();
        }

        ZobristKeys { pieces, side_to_move, castling, en_passant_file }
    }

    #[inline]
    pub fn piece(&self, color: Color, piece_type: PieceType, sq: Square) -> u64 {
        self.pieces[color as usize][piece_type as usize][sq as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        let z = &ZOBRIST;
        assert_ne!(z.piece(WHITE, PAWN, A1), z.piece(WHITE, PAWN, A2));
        assert_ne!(z.piece(WHITE, PAWN, A1), z.piece(BLACK, PAWN, A1));
        assert_ne!(z.piece(WHITE, PAWN, A1), z.piece(WHITE, KNIGHT, A1));
        assert_ne!(z.side_to_move, 0);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = ZobristKeys::create();
        let b = ZobristKeys::create();
        assert_eq!(a.piece(WHITE, QUEEN, D4), b.piece(WHITE, QUEEN, D4));
        assert_eq!(a.castling, b.castling);
    }
}
