//! Keccak-256 pair hashing compatible with on-chain sorted-pair verifiers.
//!
//! Solidity verifiers in the OpenZeppelin `MerkleProof` style combine two
//! nodes as `keccak256(abi.encodePacked(min(a, b), max(a, b)))`.  The helpers
//! below reproduce that framing bit for bit: the pair is ordered by unsigned
//! big-endian byte comparison, concatenated without a separator, and hashed.

use sha3::{Digest as _, Keccak256};

/// A 32-byte node value: either an encoded leaf or an interior hash.
pub type Digest = [u8; 32];

/// Computes the Keccak-256 digest of `bytes`.
pub fn keccak256(bytes: &[u8]) -> Digest {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Orders two nodes by unsigned big-endian byte comparison.
///
/// Array comparison in Rust is lexicographic over `u8`, which is exactly the
/// numeric order of the two values read as 256-bit big-endian integers.
pub fn sort_pair<'a>(a: &'a Digest, b: &'a Digest) -> (&'a Digest, &'a Digest) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Hashes an already-ordered pair into its parent node.
///
/// Implementations must treat `lo || hi` as a 64-byte message with no
/// separator so that roots match the external verifier.
pub trait PairHasher {
    /// Returns the parent digest of `lo` and `hi` (`lo <= hi`).
    fn hash_ordered(&self, lo: &Digest, hi: &Digest) -> Digest;

    /// Sorts the pair and hashes it.
    fn hash_pair(&self, a: &Digest, b: &Digest) -> Digest {
        let (lo, hi) = sort_pair(a, b);
        self.hash_ordered(lo, hi)
    }
}

/// The default pair hasher: Keccak-256 over the packed sorted pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Pair;

impl PairHasher for Keccak256Pair {
    fn hash_ordered(&self, lo: &Digest, hi: &Digest) -> Digest {
        let mut hasher = Keccak256::new();
        hasher.update(lo);
        hasher.update(hi);
        hasher.finalize().into()
    }
}

/// Sorts and hashes a pair with [`Keccak256Pair`].
pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    Keccak256Pair.hash_pair(a, b)
}

/// Renders a digest as `0x`-prefixed lowercase hex.
pub fn digest_to_hex(digest: &Digest) -> String {
    format!("0x{}", hex::encode(digest))
}

/// Parses a 32-byte digest from hex, with or without the `0x` prefix.
pub fn digest_from_hex(input: &str) -> Result<Digest, String> {
    let trimmed = input.trim();
    let raw = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(raw).map_err(|err| format!("invalid hex digest: {err}"))?;
    if bytes.len() != 32 {
        return Err(format!("digest must be 32 bytes, got {}", bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(last: u8) -> Digest {
        let mut out = [0u8; 32];
        out[31] = last;
        out
    }

    #[test]
    fn keccak_empty_known_answer() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn pair_hash_is_commutative() {
        let a = node(2);
        let b = node(3);
        assert_eq!(hash_sorted_pair(&a, &b), hash_sorted_pair(&b, &a));
    }

    #[test]
    fn pair_hash_matches_packed_keccak() {
        let a = node(9);
        let b = node(4);
        let mut packed = Vec::with_capacity(64);
        packed.extend_from_slice(&b);
        packed.extend_from_slice(&a);
        assert_eq!(hash_sorted_pair(&a, &b), keccak256(&packed));
    }

    #[test]
    fn sort_uses_big_endian_order() {
        let mut high = [0u8; 32];
        high[0] = 1;
        let low = node(0xff);
        let (lo, hi) = sort_pair(&high, &low);
        assert_eq!(lo, &low);
        assert_eq!(hi, &high);
    }

    #[test]
    fn hex_roundtrip_accepts_prefix() {
        let d = node(7);
        assert_eq!(digest_from_hex(&digest_to_hex(&d)).unwrap(), d);
        assert_eq!(digest_from_hex(&hex::encode(d)).unwrap(), d);
        assert!(digest_from_hex("0x1234").is_err());
    }
}
