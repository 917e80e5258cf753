#![deny(missing_docs)]

//! # prime_claim
//!
//! Client-side tooling for claiming one prime from a public claim contract.
//! The contract stores the root of a Merkle tree over the first `N` primes;
//! a claimant proves membership of one prime with a sibling path and proves
//! control of an account key by signing a one-time challenge.
//!
//! The pipeline is:
//!
//! 1. [`domain`] generates the first `N` primes with a sieve.
//! 2. [`leaf`] encodes each prime as a 32-byte big-endian leaf.
//! 3. [`merkle`] builds the tree with Keccak-256 over sorted pairs, carrying
//!    odd trailing nodes up unchanged, and derives and checks proofs.
//! 4. [`identity`] signs and recovers EIP-191 personal messages with
//!    secp256k1 keys.
//! 5. [`claim`] sequences the steps and hands the result to a
//!    [`SubmissionChannel`].
//!
//! ```rust
//! use prime_claim::{encode_leaves, generate_primes, verify_proof, MerkleTree};
//!
//! let primes = generate_primes(8).unwrap();
//! let leaves = encode_leaves(&primes).unwrap();
//! let tree = MerkleTree::build(&leaves).unwrap();
//! let proof = tree.prove(3).unwrap();
//! assert!(verify_proof(&leaves[3], &proof.siblings, &tree.root()));
//! ```
//!
//! Network transport, transaction encoding and retries are left to the
//! implementor of [`SubmissionChannel`].

pub mod claim;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod hash;
pub mod identity;
pub mod leaf;
pub mod merkle;
pub mod pow;
pub mod service;

pub use claim::{random_index, ClaimSession, ClaimStage, SubmissionChannel, TxId};
pub use config::{Chain, ClaimConfig, ConfigError, ContractInfo};
pub use domain::{generate_primes, prime_bound, sieve_primes};
pub use error::{ClaimError, Result};
pub use hash::{hash_sorted_pair, keccak256, sort_pair, Digest, Keccak256Pair, PairHasher};
pub use identity::{
    recover_address, verify_challenge, verify_challenge_hex, Address, Challenge, IdentityProof,
    MessageSigner, RecoverableSignature, SigningIdentity,
};
pub use leaf::{decode_leaf, encode_be_bytes, encode_leaf, encode_leaves, encode_with_width, Leaf};
pub use merkle::{verify_proof, verify_proof_with, MerkleProof, MerkleTree};
pub use pow::{mine_block, mine_block_parallel, verify_nonce};
pub use service::{DomainTree, ProofService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
