//! End-to-end claim flow.
//!
//! A [`ClaimSession`] walks
//! `Idle → DomainGenerated → TreeBuilt → ProofReady → IdentityProved →
//! SubmissionAttempted → {Confirmed | Rejected}` one step at a time.  Each
//! step checks the current stage, so no stage can be skipped or repeated.
//! A failed construction step leaves the stage unchanged.

use std::fmt;

use log::{info, warn};
use rand::Rng;

use crate::domain::generate_primes;
use crate::error::{ClaimError, Result};
use crate::hash::{digest_to_hex, Digest};
use crate::identity::{verify_challenge, Challenge, IdentityProof, MessageSigner};
use crate::leaf::{encode_leaves, Leaf};
use crate::merkle::{MerkleProof, MerkleTree};

/// Identifier returned by a submission channel for an accepted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submission capability: hands `(proof, leaf)` to whatever verifies claims.
///
/// Transport, retries and receipts belong to the implementation; an `Err`
/// carries its failure reason verbatim.
pub trait SubmissionChannel {
    /// Submits the claim and returns the transaction identifier.
    fn submit(&mut self, proof: &[Digest], leaf: &Leaf) -> std::result::Result<TxId, String>;
}

/// Stage of a [`ClaimSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStage {
    /// Nothing computed yet.
    Idle,
    /// The domain values exist.
    DomainGenerated,
    /// The tree over the domain exists.
    TreeBuilt,
    /// A proof for the chosen leaf exists.
    ProofReady,
    /// The challenge has been signed and self-verified.
    IdentityProved,
    /// The claim was handed to the submission channel.
    SubmissionAttempted,
    /// The channel accepted the claim.
    Confirmed(TxId),
    /// The channel refused the claim; terminal.
    Rejected(String),
}

impl ClaimStage {
    /// Short name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DomainGenerated => "DomainGenerated",
            Self::TreeBuilt => "TreeBuilt",
            Self::ProofReady => "ProofReady",
            Self::IdentityProved => "IdentityProved",
            Self::SubmissionAttempted => "SubmissionAttempted",
            Self::Confirmed(_) => "Confirmed",
            Self::Rejected(_) => "Rejected",
        }
    }
}

/// Drives one claim from domain generation to submission.
#[derive(Debug)]
pub struct ClaimSession {
    stage: ClaimStage,
    history: Vec<&'static str>,
    values: Vec<u64>,
    tree: Option<MerkleTree>,
    proof: Option<MerkleProof>,
    identity: Option<IdentityProof>,
}

impl Default for ClaimSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimSession {
    /// Starts a session in [`ClaimStage::Idle`].
    pub fn new() -> Self {
        Self {
            stage: ClaimStage::Idle,
            history: vec![ClaimStage::Idle.name()],
            values: Vec::new(),
            tree: None,
            proof: None,
            identity: None,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> &ClaimStage {
        &self.stage
    }

    /// Names of every stage entered so far, in order.
    pub fn history(&self) -> &[&'static str] {
        &self.history
    }

    /// The generated domain values.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// The built tree, once available.
    pub fn tree(&self) -> Option<&MerkleTree> {
        self.tree.as_ref()
    }

    /// The prepared proof, once available.
    pub fn proof(&self) -> Option<&MerkleProof> {
        self.proof.as_ref()
    }

    /// The identity proof, once available.
    pub fn identity(&self) -> Option<&IdentityProof> {
        self.identity.as_ref()
    }

    /// Generates the first `count` primes.
    pub fn generate_domain(&mut self, count: usize) -> Result<&[u64]> {
        self.require(&ClaimStage::Idle, "generate domain")?;
        self.values = generate_primes(count)?;
        self.advance(ClaimStage::DomainGenerated);
        Ok(&self.values)
    }

    /// Encodes the domain and builds the tree; returns the root.
    pub fn build_tree(&mut self) -> Result<Digest> {
        self.require(&ClaimStage::DomainGenerated, "build tree")?;
        let leaves = encode_leaves(&self.values)?;
        let tree = MerkleTree::build(&leaves)?;
        let root = tree.root();
        info!(
            "claim tree built over {} leaves, root {}",
            leaves.len(),
            digest_to_hex(&root)
        );
        self.tree = Some(tree);
        self.advance(ClaimStage::TreeBuilt);
        Ok(root)
    }

    /// Generates the proof for the leaf at `index`.
    pub fn prepare_proof(&mut self, index: usize) -> Result<&MerkleProof> {
        self.require(&ClaimStage::TreeBuilt, "prepare proof")?;
        let proof = match &self.tree {
            Some(tree) => tree.prove(index)?,
            None => return Err(self.invalid("prepare proof")),
        };
        self.advance(ClaimStage::ProofReady);
        Ok(self.proof.insert(proof))
    }

    /// Signs `challenge` with `signer` and checks the signature recovers to
    /// the signer's address before advancing.
    ///
    /// The challenge is consumed; a new one is needed for any later round.
    pub fn prove_identity<S: MessageSigner + ?Sized>(
        &mut self,
        signer: &S,
        challenge: Challenge,
    ) -> Result<IdentityProof> {
        self.require(&ClaimStage::ProofReady, "prove identity")?;
        let answer = signer.answer(&challenge)?;
        if !verify_challenge(challenge.as_str(), &answer.address, &answer.signature) {
            return Err(ClaimError::InvalidSignature(
                "signature does not recover to the signer address".into(),
            ));
        }
        info!("challenge signed by {}", answer.address);
        self.identity = Some(answer);
        self.advance(ClaimStage::IdentityProved);
        Ok(answer)
    }

    /// Hands the proof and leaf to `channel`.
    ///
    /// Ends in [`ClaimStage::Confirmed`] or the terminal
    /// [`ClaimStage::Rejected`]; a rejection is also returned as
    /// [`ClaimError::SubmissionRejected`].
    pub fn submit<C: SubmissionChannel + ?Sized>(&mut self, channel: &mut C) -> Result<TxId> {
        self.require(&ClaimStage::IdentityProved, "submit")?;
        let Some(proof) = self.proof.as_ref() else {
            return Err(self.invalid("submit"));
        };
        let (siblings, leaf) = (proof.siblings.clone(), proof.leaf);
        self.advance(ClaimStage::SubmissionAttempted);
        match channel.submit(&siblings, &leaf) {
            Ok(tx) => {
                info!("claim confirmed: {tx}");
                self.advance(ClaimStage::Confirmed(tx.clone()));
                Ok(tx)
            }
            Err(reason) => {
                warn!("claim rejected: {reason}");
                self.advance(ClaimStage::Rejected(reason.clone()));
                Err(ClaimError::SubmissionRejected(reason))
            }
        }
    }

    fn require(&self, expected: &ClaimStage, action: &'static str) -> Result<()> {
        if &self.stage == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> ClaimError {
        ClaimError::InvalidTransition {
            action,
            stage: self.stage.name(),
        }
    }

    fn advance(&mut self, next: ClaimStage) {
        self.history.push(next.name());
        self.stage = next;
    }
}

/// Picks a random leaf index in `1..len`, or `0` for a single-leaf domain.
pub fn random_index<R: Rng>(rng: &mut R, len: usize) -> usize {
    if len <= 1 {
        0
    } else {
        rng.gen_range(1..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SigningIdentity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Accepting;

    impl SubmissionChannel for Accepting {
        fn submit(&mut self, proof: &[Digest], _leaf: &Leaf) -> std::result::Result<TxId, String> {
            Ok(TxId(format!("0xok{}", proof.len())))
        }
    }

    fn identity() -> SigningIdentity {
        SigningIdentity::random(&mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn stages_run_in_order() {
        let mut session = ClaimSession::new();
        session.generate_domain(8).unwrap();
        session.build_tree().unwrap();
        session.prepare_proof(3).unwrap();
        session
            .prove_identity(&identity(), Challenge::from_issued("abc"))
            .unwrap();
        let tx = session.submit(&mut Accepting).unwrap();
        assert_eq!(tx, TxId("0xok3".into()));
        assert_eq!(
            session.history(),
            &[
                "Idle",
                "DomainGenerated",
                "TreeBuilt",
                "ProofReady",
                "IdentityProved",
                "SubmissionAttempted",
                "Confirmed"
            ]
        );
    }

    #[test]
    fn skipping_a_stage_is_refused() {
        let mut session = ClaimSession::new();
        assert_eq!(
            session.build_tree().unwrap_err(),
            ClaimError::InvalidTransition {
                action: "build tree",
                stage: "Idle"
            }
        );
        session.generate_domain(4).unwrap();
        assert!(session.prepare_proof(0).is_err());
        assert!(session.generate_domain(4).is_err());
        assert_eq!(session.stage(), &ClaimStage::DomainGenerated);
    }

    #[test]
    fn failed_step_keeps_stage() {
        let mut session = ClaimSession::new();
        session.generate_domain(4).unwrap();
        session.build_tree().unwrap();
        assert_eq!(
            session.prepare_proof(4).unwrap_err(),
            ClaimError::IndexOutOfRange { index: 4, len: 4 }
        );
        assert_eq!(session.stage(), &ClaimStage::TreeBuilt);
        assert!(session.prepare_proof(2).is_ok());
    }

    #[test]
    fn random_index_skips_zero() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let idx = random_index(&mut rng, 8);
            assert!((1..8).contains(&idx));
        }
        assert_eq!(random_index(&mut rng, 1), 0);
    }
}
