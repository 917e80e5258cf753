//! Fixed-width big-endian leaf encoding.
//!
//! A leaf is the `bytes32` form of a domain value, i.e. the value written as an
//! unsigned big-endian integer and left-padded with zeros.  The position of a
//! leaf in the sequence is its only identifier.

use crate::error::{ClaimError, Result};
use crate::hash::Digest;

/// Width in bytes of an encoded leaf.
pub const LEAF_WIDTH: usize = 32;

/// An encoded leaf value.
pub type Leaf = Digest;

/// Encodes `value` into exactly `width` big-endian bytes.
///
/// Fails with [`ClaimError::EncodingOverflow`] when `value` has more
/// significant bytes than `width`.
pub fn encode_with_width(value: u64, width: usize) -> Result<Vec<u8>> {
    let raw = value.to_be_bytes();
    let needed = significant_len(&raw);
    if needed > width {
        return Err(ClaimError::EncodingOverflow { needed, width });
    }
    let mut out = vec![0u8; width];
    out[width - needed..].copy_from_slice(&raw[raw.len() - needed..]);
    Ok(out)
}

/// Encodes a domain value as a 32-byte leaf.
pub fn encode_leaf(value: u64) -> Result<Leaf> {
    encode_be_bytes(&value.to_be_bytes())
}

/// Encodes an arbitrary-precision big-endian magnitude as a 32-byte leaf.
///
/// Leading zero bytes are not significant.
pub fn encode_be_bytes(magnitude: &[u8]) -> Result<Leaf> {
    let needed = significant_len(magnitude);
    if needed > LEAF_WIDTH {
        return Err(ClaimError::EncodingOverflow {
            needed,
            width: LEAF_WIDTH,
        });
    }
    let mut out = [0u8; LEAF_WIDTH];
    out[LEAF_WIDTH - needed..].copy_from_slice(&magnitude[magnitude.len() - needed..]);
    Ok(out)
}

/// Encodes a whole domain, preserving order.
pub fn encode_leaves(values: &[u64]) -> Result<Vec<Leaf>> {
    values.iter().map(|&value| encode_leaf(value)).collect()
}

/// Reads a leaf back as a `u64`, if it fits.
pub fn decode_leaf(leaf: &Leaf) -> Option<u64> {
    let (head, tail) = leaf.split_at(LEAF_WIDTH - 8);
    if head.iter().any(|&b| b != 0) {
        return None;
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(tail);
    Some(u64::from_be_bytes(word))
}

fn significant_len(bytes: &[u8]) -> usize {
    bytes.len() - bytes.iter().take_while(|&&b| b == 0).count()
}
