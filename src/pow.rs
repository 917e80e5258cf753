//! Proof-of-work nonce search over SHA-256.
//!
//! A block is `prev_hash || tx_1 || … || tx_n || nonce`, where the nonce is
//! the decimal ASCII rendering of a counter.  A nonce is accepted when the
//! SHA-256 digest, read as a big-endian integer, ends in at least
//! `difficulty` zero bits.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use sha2::{Digest as _, Sha256};

use crate::error::{ClaimError, Result};

/// Largest meaningful difficulty: every bit of the digest.
pub const MAX_DIFFICULTY: u32 = 256;

/// Counts the trailing zero bits of a big-endian digest.
pub fn trailing_zero_bits(digest: &[u8]) -> u32 {
    let mut total = 0;
    for byte in digest.iter().rev() {
        if *byte == 0 {
            total += 8;
        } else {
            return total + byte.trailing_zeros();
        }
    }
    total
}

fn block_prefix(prev_hash: &[u8], transactions: &[String]) -> Vec<u8> {
    let mut data = prev_hash.to_vec();
    for tx in transactions {
        data.extend_from_slice(tx.as_bytes());
    }
    data
}

fn digest_with_nonce(prefix: &[u8], nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prefix);
    hasher.update(nonce.to_string().as_bytes());
    hasher.finalize().into()
}

fn check_difficulty(difficulty: u32) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ClaimError::DifficultyOutOfRange(difficulty));
    }
    Ok(())
}

/// Searches nonces `0..=max_nonce` in order and returns the first that meets
/// `difficulty`, as ASCII bytes.
pub fn mine_block(
    difficulty: u32,
    prev_hash: &[u8],
    transactions: &[String],
    max_nonce: u64,
) -> Result<Vec<u8>> {
    check_difficulty(difficulty)?;
    let prefix = block_prefix(prev_hash, transactions);
    (0..=max_nonce)
        .find(|&nonce| trailing_zero_bits(&digest_with_nonce(&prefix, nonce)) >= difficulty)
        .map(|nonce| nonce.to_string().into_bytes())
        .ok_or(ClaimError::NonceSpaceExhausted(max_nonce))
}

/// [`mine_block`] spread over the rayon pool; returns the same smallest nonce.
pub fn mine_block_parallel(
    difficulty: u32,
    prev_hash: &[u8],
    transactions: &[String],
    max_nonce: u64,
) -> Result<Vec<u8>> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        check_difficulty(difficulty)?;
        let prefix = block_prefix(prev_hash, transactions);
        (0..=max_nonce)
            .into_par_iter()
            .find_first(|&nonce| {
                trailing_zero_bits(&digest_with_nonce(&prefix, nonce)) >= difficulty
            })
            .map(|nonce| nonce.to_string().into_bytes())
            .ok_or(ClaimError::NonceSpaceExhausted(max_nonce))
    }
    #[cfg(target_arch = "wasm32")]
    {
        mine_block(difficulty, prev_hash, transactions, max_nonce)
    }
}

/// Checks that `nonce` completes the block at `difficulty`.
pub fn verify_nonce(
    difficulty: u32,
    prev_hash: &[u8],
    transactions: &[String],
    nonce: &[u8],
) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }
    let mut hasher = Sha256::new();
    hasher.update(block_prefix(prev_hash, transactions));
    hasher.update(nonce);
    let digest: [u8; 32] = hasher.finalize().into();
    trailing_zero_bits(&digest) >= difficulty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txs() -> Vec<String> {
        vec!["alice pays bob 5".into(), "bob pays carol 2".into()]
    }

    #[test]
    fn trailing_bits_counting() {
        assert_eq!(trailing_zero_bits(&[0xff, 0x00]), 8);
        assert_eq!(trailing_zero_bits(&[0x00, 0x08]), 3);
        assert_eq!(trailing_zero_bits(&[0x00; 32]), 256);
    }

    #[test]
    fn mined_nonce_verifies() {
        let prev = [0xabu8; 32];
        let nonce = mine_block(10, &prev, &txs(), 1 << 20).unwrap();
        assert!(verify_nonce(10, &prev, &txs(), &nonce));
        assert!(std::str::from_utf8(&nonce).unwrap().parse::<u64>().is_ok());
    }

    #[test]
    fn zero_difficulty_takes_first_nonce() {
        assert_eq!(mine_block(0, b"", &[], 0).unwrap(), b"0".to_vec());
    }

    #[test]
    fn parallel_search_matches_sequential() {
        let prev = [0x01u8; 32];
        assert_eq!(
            mine_block(8, &prev, &txs(), 1 << 16).unwrap(),
            mine_block_parallel(8, &prev, &txs(), 1 << 16).unwrap()
        );
    }

    #[test]
    fn limits_are_reported() {
        assert_eq!(
            mine_block(257, b"", &[], 10),
            Err(ClaimError::DifficultyOutOfRange(257))
        );
        assert_eq!(
            mine_block(256, b"", &[], 3),
            Err(ClaimError::NonceSpaceExhausted(3))
        );
    }
}
