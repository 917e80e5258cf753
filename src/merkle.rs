//! Sorted-pair Merkle tree over encoded leaves.
//!
//! Level 0 holds the leaves.  Each higher level pairs adjacent entries left to
//! right and hashes the sorted pair; a lone trailing entry on an odd-length
//! level is carried up unchanged, never duplicated or padded.  The last level
//! holds the root.
//!
//! Because pair hashing sorts its inputs, a proof is just the ordered list of
//! siblings: no left/right direction bits are needed, and levels where the
//! running node was carried up contribute nothing.

use log::debug;
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, Result};
use crate::hash::{digest_from_hex, digest_to_hex, Digest, Keccak256Pair, PairHasher};
use crate::leaf::Leaf;

/// An immutable, fully built Merkle tree.
///
/// The tree has no mutating methods; share it behind an `Arc` to serve proofs
/// from several threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Box<[Box<[Digest]>]>,
}

impl MerkleTree {
    /// Builds the tree with the Keccak-256 sorted-pair hasher.
    pub fn build(leaves: &[Leaf]) -> Result<Self> {
        Self::build_with(&Keccak256Pair, leaves)
    }

    /// Builds the tree with a caller-supplied pair hasher.
    ///
    /// Fails with [`ClaimError::EmptyLeafSet`] when `leaves` is empty.
    pub fn build_with<H: PairHasher + ?Sized>(hasher: &H, leaves: &[Leaf]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(ClaimError::EmptyLeafSet);
        }
        let mut levels: Vec<Box<[Digest]>> = vec![leaves.into()];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 {
                break;
            }
            let next: Box<[Digest]> = current
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hasher.hash_pair(left, right),
                    [carried] => *carried,
                    _ => unreachable!("chunks(2) yields one or two entries"),
                })
                .collect();
            levels.push(next);
        }
        debug!(
            "built merkle tree over {} leaves with {} levels",
            leaves.len(),
            levels.len()
        );
        Ok(Self {
            levels: levels.into_boxed_slice(),
        })
    }

    /// Returns the root digest.
    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    /// Returns the leaf level.
    pub fn leaves(&self) -> &[Leaf] {
        &self.levels[0]
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Returns level `height` (0 = leaves), if it exists.
    pub fn level(&self, height: usize) -> Option<&[Digest]> {
        self.levels.get(height).map(|level| &**level)
    }

    /// Iterates the levels from the leaves up to the root.
    pub fn levels(&self) -> impl Iterator<Item = &[Digest]> {
        self.levels.iter().map(|level| &**level)
    }

    /// Number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Generates the inclusion proof for the leaf at `index`.
    ///
    /// Fails with [`ClaimError::IndexOutOfRange`] for an invalid index.
    pub fn prove(&self, index: usize) -> Result<MerkleProof> {
        let len = self.leaf_count();
        if index >= len {
            return Err(ClaimError::IndexOutOfRange { index, len });
        }
        let mut siblings = Vec::with_capacity(self.depth());
        let mut idx = index;
        for level in &self.levels[..self.depth()] {
            let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            if let Some(value) = level.get(sibling) {
                siblings.push(*value);
            }
            idx /= 2;
        }
        Ok(MerkleProof {
            index,
            leaf: self.levels[0][index],
            siblings,
        })
    }

    /// Generates the proof of every leaf, in leaf order.
    pub fn prove_all(&self) -> Vec<MerkleProof> {
        let indices = 0..self.leaf_count();
        #[cfg(not(target_arch = "wasm32"))]
        let proofs = indices.into_par_iter().map(|idx| self.prove_unchecked(idx));
        #[cfg(target_arch = "wasm32")]
        let proofs = indices.map(|idx| self.prove_unchecked(idx));
        proofs.collect()
    }

    fn prove_unchecked(&self, index: usize) -> MerkleProof {
        match self.prove(index) {
            Ok(proof) => proof,
            Err(_) => unreachable!("index {index} is below the leaf count"),
        }
    }
}

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Index of the leaf within the tree at generation time.
    pub index: usize,
    /// The leaf being proven.
    pub leaf: Leaf,
    /// Sibling digests from the leaf level upwards.
    pub siblings: Vec<Digest>,
}

#[derive(Serialize, Deserialize)]
struct ProofJson {
    index: usize,
    leaf: String,
    proof: Vec<String>,
}

impl MerkleProof {
    /// Checks the proof against `root` with the Keccak-256 pair hasher.
    pub fn verify(&self, root: &Digest) -> bool {
        verify_proof(&self.leaf, &self.siblings, root)
    }

    /// Serialises the proof to JSON with `0x`-prefixed hex digests.
    pub fn to_json_string(&self) -> String {
        let wire = ProofJson {
            index: self.index,
            leaf: digest_to_hex(&self.leaf),
            proof: self.siblings.iter().map(digest_to_hex).collect(),
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parses a proof emitted by [`MerkleProof::to_json_string`].
    pub fn from_json_str(input: &str) -> Result<Self> {
        let wire: ProofJson = serde_json::from_str(input)
            .map_err(|err| ClaimError::Decode(format!("invalid proof JSON: {err}")))?;
        let leaf = digest_from_hex(&wire.leaf).map_err(ClaimError::Decode)?;
        let siblings = wire
            .proof
            .iter()
            .map(|item| digest_from_hex(item).map_err(ClaimError::Decode))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            index: wire.index,
            leaf,
            siblings,
        })
    }
}

/// Recomputes the root from `leaf` and `siblings` and compares it to `root`.
pub fn verify_proof(leaf: &Leaf, siblings: &[Digest], root: &Digest) -> bool {
    verify_proof_with(&Keccak256Pair, leaf, siblings, root)
}

/// [`verify_proof`] with a caller-supplied pair hasher.
pub fn verify_proof_with<H: PairHasher + ?Sized>(
    hasher: &H,
    leaf: &Leaf,
    siblings: &[Digest],
    root: &Digest,
) -> bool {
    let computed = siblings
        .iter()
        .fold(*leaf, |current, sibling| hasher.hash_pair(&current, sibling));
    computed == *root
}
