use hasher_bench::{
    layout::{read_nonce, Block, BLOCK_LEN},
    search::{compress, mask, search, verify},
    testing::random_blocks,
};
use sha1::{Digest as _, Sha1};

/// A message of at most 55 bytes, padded into its single SHA-1 block.
fn padded(message: &[u8]) -> Block {
    assert!(message.len() <= 55);
    let mut block = [0u8; BLOCK_LEN];
    block[..message.len()].copy_from_slice(message);
    block[message.len()] = 0x80;
    block[56..].copy_from_slice(&(message.len() as u64 * 8).to_be_bytes());
    block
}

#[test]
fn compression_matches_sha1() {
    for message in [&b""[..], &b"abc"[..], &[0xA5u8; 55][..]] {
        let expected = Sha1::digest(message);
        let digest = compress(&padded(message));
        assert_eq!(digest.to_string(), hex::encode(expected));
    }
    assert_eq!(
        compress(&padded(b"abc")).to_string(),
        "a9993e364706816aba3e25717850c26c9cd0d89d"
    );
}

#[test]
fn compression_matches_sha1_on_random_messages() {
    for (len, block) in random_blocks(64, 56).iter().enumerate() {
        let message = &block[..len];
        assert_eq!(
            compress(&padded(message)).to_string(),
            hex::encode(Sha1::digest(message)),
            "{} byte message",
            len
        );
    }
}

#[test]
fn search_is_deterministic() {
    let mask = mask(10).unwrap();
    for block in random_blocks(12, 4) {
        let first = search(&mut block.clone(), mask);
        let second = search(&mut block.clone(), mask);
        assert_eq!(first, second);
        assert!(verify(&block, &first, mask));
    }
}

#[test]
fn winning_nonce_is_the_smallest() {
    let mask = mask(8).unwrap();
    for block in random_blocks(3, 4) {
        let mut solved = block;
        let result = search(&mut solved, mask);
        assert_eq!(read_nonce(&solved), result.nonce);
        for nonce in 0..result.nonce {
            let mut candidate = block;
            candidate[60..].copy_from_slice(&nonce.to_be_bytes());
            assert_ne!(compress(&candidate).a & mask, 0, "nonce {} also wins", nonce);
        }
    }
}

#[test]
fn harder_masks_never_need_fewer_nonces() {
    for block in random_blocks(12, 8) {
        let mut previous = 0;
        for d in 0..=12 {
            let result = search(&mut block.clone(), mask(d).unwrap());
            assert!(result.nonce >= previous, "difficulty {}", d);
            previous = result.nonce;
        }
    }
}
