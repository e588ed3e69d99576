//! Generate test instances.

use rand::{rngs::StdRng, SeedableRng as _};
use rand_core::RngCore as _;

use crate::layout::{write_nonce, Block, BLOCK_LEN};

/// Mask used by the self-test, 20 leading zero bits.
pub const CHECK_MASK: u32 = 0xFFFF_F000;

/// `count` blocks of seeded random payload, nonce fields zeroed.
///
/// The same seed always yields the same blocks, so repetitions of one
/// experiment hash identical payloads.
pub fn random_blocks(seed: u64, count: usize) -> Vec<Block> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut block = [0u8; BLOCK_LEN];
            rng.fill_bytes(&mut block);
            write_nonce(&mut block, 0);
            block
        })
        .collect()
}

/// The two fixed blocks of the self-test: all `0xFF`, then all `0x0F`.
pub fn pattern_blocks() -> Vec<Block> {
    [0xFFu8, 0x0F]
        .iter()
        .map(|&byte| {
            let mut block = [byte; BLOCK_LEN];
            write_nonce(&mut block, 0);
            block
        })
        .collect()
}
