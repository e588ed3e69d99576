//! Nonce search over single SHA-1 blocks.
//!
//! This is the host-side twin of the accelerator's search core: nonces are
//! tried in ascending order from zero and the first one whose compressed
//! state satisfies the difficulty mask wins.
//!
//! The loop has no iteration cap. With a mask of all ones and a block whose
//! every nonce misses, it never returns; callers choose difficulties that keep
//! the expected `2^d` attempts reasonable.

use crate::{
    layout::{write_nonce, Block, Digest, HashResult},
    Error, Result,
};

/// Largest supported difficulty.
pub const MAX_DIFFICULTY: u32 = 32;

const IV: [u32; 5] = [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0];

/// SHA-1 compression of one block from the standard initial state.
pub fn compress(block: &Block) -> Digest {
    let mut state = IV;
    sha1::compress(&mut state, &[(*block).into()]);
    let [a, b, c, d, e] = state;
    Digest { a, b, c, d, e }
}

/// Mask with the top `difficulty` bits set.
pub fn mask(difficulty: u32) -> Result<u32> {
    if difficulty > MAX_DIFFICULTY {
        return Err(Error::InvalidDifficulty(difficulty));
    }
    Ok((0xFFFF_FFFFu64 & (0xFFFF_FFFFu64 << (32 - difficulty))) as u32)
}

#[inline(always)]
pub fn accepts(digest: &Digest, mask: u32) -> bool {
    digest.a & mask == 0
}

/// Find the smallest nonce whose digest satisfies `mask`.
///
/// The block is left holding the winning nonce.
pub fn search(block: &mut Block, mask: u32) -> HashResult {
    let mut nonce = 0u32;
    loop {
        write_nonce(block, nonce);
        let digest = compress(block);
        if accepts(&digest, mask) {
            return HashResult { digest, nonce };
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Check a result produced elsewhere against the block it claims to solve.
pub fn verify(block: &Block, result: &HashResult, mask: u32) -> bool {
    let mut block = *block;
    write_nonce(&mut block, result.nonce);
    let digest = compress(&block);
    digest == result.digest && accepts(&digest, mask)
}
