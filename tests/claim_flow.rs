//! End-to-end claim flow against in-memory submission channels.

use prime_claim::{
    encode_leaf, verify_challenge, verify_proof, Challenge, ClaimError, ClaimSession, ClaimStage,
    Digest, Leaf, MessageSigner, SigningIdentity, SubmissionChannel, TxId,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mimics the claim contract: accepts a prime once, checking the proof
/// against its stored root.
struct ContractChannel {
    root: Digest,
    claimed: Vec<Leaf>,
}

impl SubmissionChannel for ContractChannel {
    fn submit(&mut self, proof: &[Digest], leaf: &Leaf) -> Result<TxId, String> {
        if !verify_proof(leaf, proof, &self.root) {
            return Err("invalid merkle proof".into());
        }
        if self.claimed.contains(leaf) {
            return Err("prime already claimed".into());
        }
        self.claimed.push(*leaf);
        Ok(TxId(format!("0x{:064x}", self.claimed.len())))
    }
}

fn identity() -> SigningIdentity {
    SigningIdentity::from_hex("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
        .unwrap()
}

fn ready_session(count: usize, index: usize) -> ClaimSession {
    let mut session = ClaimSession::new();
    session.generate_domain(count).unwrap();
    session.build_tree().unwrap();
    session.prepare_proof(index).unwrap();
    let challenge = Challenge::random(&mut StdRng::seed_from_u64(index as u64), 32);
    session.prove_identity(&identity(), challenge).unwrap();
    session
}

#[test]
fn claim_is_confirmed_by_contract() {
    let mut session = ready_session(8192, 4242);
    let root = session.tree().unwrap().root();
    let mut contract = ContractChannel {
        root,
        claimed: Vec::new(),
    };
    let tx = session.submit(&mut contract).unwrap();
    assert_eq!(session.stage(), &ClaimStage::Confirmed(tx));
    assert_eq!(contract.claimed, vec![encode_leaf(session.values()[4242]).unwrap()]);
}

#[test]
fn second_claim_of_same_prime_is_rejected_and_terminal() {
    let root = ready_session(64, 5).tree().unwrap().root();
    let mut contract = ContractChannel {
        root,
        claimed: Vec::new(),
    };
    ready_session(64, 5).submit(&mut contract).unwrap();

    let mut again = ready_session(64, 5);
    let err = again.submit(&mut contract).unwrap_err();
    assert_eq!(
        err,
        ClaimError::SubmissionRejected("prime already claimed".into())
    );
    assert_eq!(
        again.stage(),
        &ClaimStage::Rejected("prime already claimed".into())
    );
    assert!(matches!(
        again.submit(&mut contract),
        Err(ClaimError::InvalidTransition { stage: "Rejected", .. })
    ));
    assert_eq!(
        again.history().last().copied(),
        Some("Rejected")
    );
}

#[test]
fn proof_from_different_domain_is_rejected() {
    let foreign_root = ready_session(32, 1).tree().unwrap().root();
    let mut contract = ContractChannel {
        root: foreign_root,
        claimed: Vec::new(),
    };
    let mut session = ready_session(64, 40);
    assert_eq!(
        session.submit(&mut contract),
        Err(ClaimError::SubmissionRejected("invalid merkle proof".into()))
    );
}

#[test]
fn identity_proof_is_recorded_and_verifiable() {
    let session = ready_session(16, 3);
    let proof = session.identity().copied().unwrap();
    assert_eq!(proof.address, identity().address());
    assert_eq!(
        proof.address.to_string(),
        "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
    );
    let challenge = Challenge::random(&mut StdRng::seed_from_u64(3), 32);
    assert!(verify_challenge(
        challenge.as_str(),
        &proof.address,
        &proof.signature
    ));
}
