//! Shared, read-only tree serving proofs to concurrent callers.

use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::domain::generate_primes;
use crate::error::Result;
use crate::hash::{digest_to_hex, Digest};
use crate::leaf::encode_leaves;
use crate::merkle::{MerkleProof, MerkleTree};

/// A tree built over the first `count` primes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTree {
    /// Number of primes the tree was built from.
    pub count: usize,
    /// The domain values, leaf order.
    pub values: Arc<[u64]>,
    /// The built tree.
    pub tree: MerkleTree,
}

impl DomainTree {
    /// Generates the domain, encodes it and builds the tree.
    pub fn build(count: usize) -> Result<Self> {
        let values = generate_primes(count)?;
        let leaves = encode_leaves(&values)?;
        let tree = MerkleTree::build(&leaves)?;
        Ok(Self {
            count,
            values: values.into(),
            tree,
        })
    }

    /// Root of the tree.
    pub fn root(&self) -> Digest {
        self.tree.root()
    }
}

/// Serves proofs from a shared tree and swaps in rebuilt trees atomically.
///
/// Readers take a snapshot `Arc` and work without holding the lock.  A
/// rebuild constructs the complete replacement before the pointer swap, so no
/// reader ever sees a partially built tree.
#[derive(Debug)]
pub struct ProofService {
    current: RwLock<Arc<DomainTree>>,
}

impl ProofService {
    /// Builds the initial tree over `count` primes.
    pub fn new(count: usize) -> Result<Self> {
        let tree = DomainTree::build(count)?;
        info!(
            "proof service ready: {} leaves, root {}",
            count,
            digest_to_hex(&tree.root())
        );
        Ok(Self {
            current: RwLock::new(Arc::new(tree)),
        })
    }

    /// Returns the tree currently being served.
    pub fn snapshot(&self) -> Arc<DomainTree> {
        self.current.read().clone()
    }

    /// Proves the leaf at `index` against the current tree.
    pub fn prove(&self, index: usize) -> Result<(Digest, MerkleProof)> {
        let snapshot = self.snapshot();
        let proof = snapshot.tree.prove(index)?;
        Ok((snapshot.root(), proof))
    }

    /// Replaces the served tree with one built over `count` primes.
    ///
    /// On failure the previous tree keeps being served.
    pub fn rebuild(&self, count: usize) -> Result<Digest> {
        let replacement = Arc::new(DomainTree::build(count)?);
        let root = replacement.root();
        *self.current.write() = replacement;
        info!(
            "proof service rebuilt: {} leaves, root {}",
            count,
            digest_to_hex(&root)
        );
        Ok(root)
    }
}
