//! Memory layout of a hasher job.
//!
//! A job's buffer holds `n` 64-byte blocks, a 64-byte pad, then `n` packed
//! 24-byte result records:
//!
//! ```text
//! base                      base + 64n      base + 64n + 64
//! | block 0 | ... | block n-1 |    pad       | result 0 | ... | result n-1 |
//! ```
//!
//! The pad is part of the hardware's addressing convention and is kept even
//! though nothing is stored in it.

use core::fmt;

use crate::{Error, Result};

/// Size of one input block.
pub const BLOCK_LEN: usize = 64;
/// Offset of the big-endian nonce inside a block.
pub const NONCE_OFFSET: usize = 60;
/// Size of one packed result record.
pub const RESULT_LEN: usize = 24;
/// Gap between the block region and the result region.
pub const PAD: usize = 64;
/// Size of the command record handed to the device.
pub const JOB_LEN: usize = 16;

/// 512-bit input block; bytes 60..64 hold the nonce.
pub type Block = [u8; BLOCK_LEN];

/// SHA-1 state words after compressing one block.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Digest {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub e: u32,
}

impl Digest {
    pub const fn words(&self) -> [u32; 5] {
        [self.a, self.b, self.c, self.d, self.e]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = [0u8; 20];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        f.write_str(&hex::encode(bytes))
    }
}

/// Winning digest and nonce of one block.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct HashResult {
    pub digest: Digest,
    pub nonce: u32,
}

/// One batch request, addressed physically.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Job {
    pub block_address: u32,
    pub block_count: u32,
    pub difficulty_mask: u32,
    pub result_address: u32,
}

impl Job {
    /// Job over a buffer laid out canonically at `block_address`.
    pub fn new(block_address: u32, block_count: u32, difficulty_mask: u32) -> Result<Self> {
        if block_count == 0 {
            return Err(Error::EmptyJob);
        }
        let result_address = u32::try_from(result_region_offset(block_count as usize))
            .ok()
            .and_then(|offset| block_address.checked_add(offset))
            .ok_or(Error::AddressRange(block_address))?;
        Ok(Self {
            block_address,
            block_count,
            difficulty_mask,
            result_address,
        })
    }

    pub const fn blocks(&self) -> usize {
        self.block_count as usize
    }

    /// Command record, see [`encode_job`].
    pub fn encode(&self) -> Result<[u8; JOB_LEN]> {
        encode_job(
            self.block_address,
            self.block_count,
            self.difficulty_mask,
            self.result_address,
        )
    }

    /// Offset of the result region relative to the block region.
    pub const fn result_offset(&self) -> usize {
        self.result_address.wrapping_sub(self.block_address) as usize
    }
}

/// Four-word command record, in register order, host byte order.
pub fn encode_job(
    block_address: u32,
    block_count: u32,
    difficulty_mask: u32,
    result_address: u32,
) -> Result<[u8; JOB_LEN]> {
    if block_count == 0 {
        return Err(Error::EmptyJob);
    }
    let mut record = [0u8; JOB_LEN];
    let words = [block_address, block_count, difficulty_mask, result_address];
    for (chunk, word) in record.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    Ok(record)
}

pub const fn block_region_size(blocks: usize) -> usize {
    blocks * BLOCK_LEN
}

pub const fn result_region_offset(blocks: usize) -> usize {
    blocks * BLOCK_LEN + PAD
}

pub const fn result_region_size(blocks: usize) -> usize {
    blocks * RESULT_LEN
}

/// Minimum buffer size for a job of `blocks` blocks.
pub const fn buffer_size(blocks: usize) -> usize {
    block_region_size(blocks) + result_region_size(blocks) + PAD
}

// field order of the hardware's record: b, a, d, c, nonce, e
const B: usize = 0;
const A: usize = 4;
const D: usize = 8;
const C: usize = 12;
const NONCE: usize = 16;
const E: usize = 20;

fn word(record: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&record[at..at + 4]);
    u32::from_le_bytes(bytes)
}

/// Read the record at `index` from a result region.
pub fn decode_result(results: &[u8], index: usize) -> Result<HashResult> {
    let start = index * RESULT_LEN;
    let record = results
        .get(start..start + RESULT_LEN)
        .ok_or(Error::BufferTooSmall {
            needed: start + RESULT_LEN,
            len: results.len(),
        })?;
    Ok(HashResult {
        digest: Digest {
            a: word(record, A),
            b: word(record, B),
            c: word(record, C),
            d: word(record, D),
            e: word(record, E),
        },
        nonce: word(record, NONCE),
    })
}

pub fn encode_result(result: &HashResult) -> [u8; RESULT_LEN] {
    let mut record = [0u8; RESULT_LEN];
    let digest = &result.digest;
    for (at, value) in [
        (B, digest.b),
        (A, digest.a),
        (D, digest.d),
        (C, digest.c),
        (NONCE, result.nonce),
        (E, digest.e),
    ] {
        record[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    record
}

#[inline(always)]
pub fn write_nonce(block: &mut Block, nonce: u32) {
    block[NONCE_OFFSET..].copy_from_slice(&nonce.to_be_bytes());
}

#[inline(always)]
pub fn read_nonce(block: &Block) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&block[NONCE_OFFSET..]);
    u32::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_sizes() {
        for blocks in 1..=64 {
            assert_eq!(block_region_size(blocks), blocks * 64);
            assert_eq!(result_region_offset(blocks), blocks * 64 + 64);
            assert_eq!(
                buffer_size(blocks),
                blocks * 64 + blocks * 24 + 64,
            );
        }
    }

    #[test]
    fn canonical_job() {
        let job = Job::new(0x1000_0000, 3, 0xFFFF_0000).unwrap();
        assert_eq!(job.result_address, 0x1000_0000 + 3 * 64 + 64);
        assert_eq!(job.result_offset(), 256);
        assert!(matches!(Job::new(0, 0, 0), Err(Error::EmptyJob)));
        assert!(matches!(
            Job::new(u32::MAX - 10, 1, 0),
            Err(Error::AddressRange(_))
        ));
    }

    #[test]
    fn job_record_is_in_register_order() {
        let record = encode_job(0x1122_3344, 7, 0xFFF0_0000, 0x5566_7788).unwrap();
        let words: Vec<u32> = record
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(words, [0x1122_3344, 7, 0xFFF0_0000, 0x5566_7788]);
        assert!(matches!(encode_job(0, 0, 0, 0), Err(Error::EmptyJob)));
    }

    #[test]
    fn result_record_field_order() {
        let result = HashResult {
            digest: Digest {
                a: 0x0A0A_0A0A,
                b: 0x0B0B_0B0B,
                c: 0x0C0C_0C0C,
                d: 0x0D0D_0D0D,
                e: 0x0E0E_0E0E,
            },
            nonce: 0x0102_0304,
        };
        let record = encode_result(&result);
        assert_eq!(&record[0..4], &[0x0B; 4]);
        assert_eq!(&record[4..8], &[0x0A; 4]);
        assert_eq!(&record[8..12], &[0x0D; 4]);
        assert_eq!(&record[12..16], &[0x0C; 4]);
        assert_eq!(&record[16..20], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&record[20..24], &[0x0E; 4]);

        let mut region = vec![0u8; 3 * RESULT_LEN];
        region[2 * RESULT_LEN..].copy_from_slice(&record);
        assert_eq!(decode_result(&region, 2).unwrap(), result);
        assert_eq!(decode_result(&region, 0).unwrap(), HashResult::default());
    }

    #[test]
    fn decode_past_the_end() {
        let region = [0u8; 30];
        assert!(matches!(
            decode_result(&region, 1),
            Err(Error::BufferTooSmall { needed: 48, len: 30 })
        ));
    }

    #[test]
    fn nonce_is_big_endian_in_the_last_word() {
        let mut block = [0xAAu8; BLOCK_LEN];
        write_nonce(&mut block, 0x1234_5678);
        assert_eq!(&block[60..], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&block[..60], &[0xAA; 60][..]);
        assert_eq!(read_nonce(&block), 0x1234_5678);
    }

    #[test]
    fn digest_displays_as_hex() {
        let digest = Digest {
            a: 0xda39a3ee,
            b: 0x5e6b4b0d,
            c: 0x3255bfef,
            d: 0x95601890,
            e: 0xafd80709,
        };
        assert_eq!(
            digest.to_string(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
