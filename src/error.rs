//! Error taxonomy shared by every construction step of the claim pipeline.
//!
//! Verification routines return `bool` instead of these errors: a proof or
//! signature that does not match is an expected outcome.

use thiserror::Error;

/// Failures reported by the encoder, domain generator, tree, identity and
/// claim-flow routines.
///
/// Every variant is local and deterministic; the caller may retry with
/// corrected input. Messages never carry secret key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The value needs more significant bytes than the fixed leaf width.
    #[error("value needs {needed} bytes but the encoding width is {width}")]
    EncodingOverflow {
        /// Significant bytes required by the value.
        needed: usize,
        /// Fixed width of the encoding.
        width: usize,
    },

    /// The sieve bound does not contain the requested number of primes.
    #[error("bound {limit} yields only {found} of {requested} requested primes")]
    InsufficientRange {
        /// Number of primes requested.
        requested: usize,
        /// Number of primes found below `limit`.
        found: usize,
        /// Upper bound that was sieved.
        limit: usize,
    },

    /// A tree cannot be built from zero leaves.
    #[error("cannot build a merkle tree from an empty leaf set")]
    EmptyLeafSet,

    /// The leaf index is not within `[0, len)`.
    #[error("leaf index {index} not in [0, {len})")]
    IndexOutOfRange {
        /// Requested leaf index.
        index: usize,
        /// Number of leaves in the tree.
        len: usize,
    },

    /// Signature bytes are malformed or do not recover to a public key.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Producing a signature with a held key failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The submission channel refused the claim; the reason is opaque.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// Secret key material could not be parsed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// A claim-flow step was invoked from the wrong stage.
    #[error("cannot {action} while in stage {stage}")]
    InvalidTransition {
        /// Step that was attempted.
        action: &'static str,
        /// Stage the session was in.
        stage: &'static str,
    },

    /// Proof-of-work difficulty is larger than the digest width.
    #[error("difficulty {0} exceeds 256 bits")]
    DifficultyOutOfRange(u32),

    /// No nonce up to the search limit satisfied the difficulty.
    #[error("no nonce below {0} meets the difficulty")]
    NonceSpaceExhausted(u64),

    /// Hex or JSON input could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience alias for results produced by this crate.
pub type Result<T, E = ClaimError> = std::result::Result<T, E>;
