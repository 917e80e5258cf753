use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::write_output;
use crate::claim::{random_index, ClaimSession, SubmissionChannel, TxId};
use crate::config::Chain;
use crate::hash::{digest_from_hex, digest_to_hex, Digest};
use crate::identity::{verify_challenge, Address, Challenge, RecoverableSignature, SigningIdentity};
use crate::leaf::{decode_leaf, Leaf};
use crate::merkle::verify_proof;
use crate::service::DomainTree;

const ARTIFACT_SCHEMA: &str = "primeclaim.claim.v1";

/// Options for building a claim artifact.
#[derive(Debug, Clone)]
pub struct BuildClaimOptions {
    /// Number of primes in the domain.
    pub prime_count: usize,
    /// Leaf to claim; a random index in `1..prime_count` when absent.
    pub index: Option<usize>,
    /// Secret key file used to answer the challenge.
    pub key_file: PathBuf,
    /// Challenge issued by the verifier; a random one when absent.
    pub challenge: Option<String>,
    /// Length of a generated challenge.
    pub challenge_len: usize,
    /// Chain the claim targets.
    pub chain: Chain,
    /// Claim contract address on `chain`, when known.
    pub contract_address: Option<String>,
}

/// Everything an external sender needs to submit a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimArtifact {
    /// Artifact schema tag.
    pub schema: String,
    /// Creation time in milliseconds since the epoch.
    pub generated_at_ms: u64,
    /// Target chain.
    pub chain: Chain,
    /// Claim contract address, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Number of primes in the domain.
    pub prime_count: usize,
    /// Claimed leaf index.
    pub index: usize,
    /// Claimed prime.
    pub prime: u64,
    /// Encoded leaf, hex.
    pub leaf: String,
    /// Tree root, hex.
    pub merkle_root: String,
    /// Sibling path, hex.
    pub proof: Vec<String>,
    /// The challenge that was signed.
    pub challenge: String,
    /// Checksummed signer address.
    pub address: String,
    /// Hex `r || s || v` signature.
    pub signature: String,
}

/// Submission channel that writes the claim to a JSON artifact for an
/// external transaction sender.
struct ArtifactChannel<'a> {
    output: &'a Path,
    template: ClaimArtifact,
}

impl SubmissionChannel for ArtifactChannel<'_> {
    fn submit(&mut self, proof: &[Digest], leaf: &Leaf) -> Result<TxId, String> {
        let mut artifact = self.template.clone();
        artifact.leaf = digest_to_hex(leaf);
        artifact.proof = proof.iter().map(digest_to_hex).collect();
        write_artifact(self.output, &artifact)?;
        Ok(TxId(format!("file:{}", self.output.display())))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_artifact(path: &Path, artifact: &ClaimArtifact) -> Result<(), String> {
    let encoded = serde_json::to_vec_pretty(artifact)
        .map_err(|e| format!("failed to encode claim artifact: {e}"))?;
    write_output(path, &encoded)
}

/// Runs the claim flow and writes the resulting artifact to `output`.
///
/// Returns the Merkle root as hex.
pub fn run_build_claim(opts: &BuildClaimOptions, output: &Path) -> Result<String, String> {
    let identity = SigningIdentity::from_file(&opts.key_file).map_err(|e| e.to_string())?;
    let mut session = ClaimSession::new();
    session
        .generate_domain(opts.prime_count)
        .map_err(|e| e.to_string())?;
    let root = session.build_tree().map_err(|e| e.to_string())?;
    let index = opts
        .index
        .unwrap_or_else(|| random_index(&mut OsRng, opts.prime_count));
    session.prepare_proof(index).map_err(|e| e.to_string())?;
    let prime = session.values()[index];

    let challenge = match &opts.challenge {
        Some(text) => Challenge::from_issued(text.clone()),
        None => Challenge::random(&mut OsRng, opts.challenge_len),
    };
    let challenge_text = challenge.as_str().to_string();
    let answer = session
        .prove_identity(&identity, challenge)
        .map_err(|e| e.to_string())?;

    let mut channel = ArtifactChannel {
        output,
        template: ClaimArtifact {
            schema: ARTIFACT_SCHEMA.to_string(),
            generated_at_ms: now_millis(),
            chain: opts.chain,
            contract_address: opts.contract_address.clone(),
            prime_count: opts.prime_count,
            index,
            prime,
            leaf: String::new(),
            merkle_root: digest_to_hex(&root),
            proof: Vec::new(),
            challenge: challenge_text,
            address: answer.address.to_string(),
            signature: answer.signature.to_hex(),
        },
    };
    let tx = session.submit(&mut channel).map_err(|e| e.to_string())?;
    info!("claim for prime {prime} (index {index}) written to {tx}");
    Ok(digest_to_hex(&root))
}

/// Reads a claim artifact and checks it against the domain it names.
///
/// The root is recomputed from `prime_count`; the stored root, the claimed
/// index and prime, the Merkle proof and the challenge signature must all
/// agree with it.
pub fn run_verify_claim(path: &Path) -> Result<bool, String> {
    let raw = std::fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let artifact: ClaimArtifact =
        serde_json::from_slice(&raw).map_err(|e| format!("invalid claim artifact: {e}"))?;
    if artifact.schema != ARTIFACT_SCHEMA {
        return Err(format!("unsupported artifact schema {}", artifact.schema));
    }
    let leaf = digest_from_hex(&artifact.leaf)?;
    let root = digest_from_hex(&artifact.merkle_root)?;
    let proof = artifact
        .proof
        .iter()
        .map(|item| digest_from_hex(item))
        .collect::<Result<Vec<_>, _>>()?;

    let domain = DomainTree::build(artifact.prime_count).map_err(|e| e.to_string())?;
    if root != domain.root() {
        debug!(
            "artifact root {} is not the root of the first {} primes",
            artifact.merkle_root, artifact.prime_count
        );
        return Ok(false);
    }
    if domain.values.get(artifact.index) != Some(&artifact.prime) {
        debug!(
            "prime {} is not at index {} of the domain",
            artifact.prime, artifact.index
        );
        return Ok(false);
    }
    if decode_leaf(&leaf) != Some(artifact.prime) {
        return Ok(false);
    }
    let proof_ok = verify_proof(&leaf, &proof, &root);
    let identity_ok = match (
        artifact.address.parse::<Address>(),
        RecoverableSignature::from_hex(&artifact.signature),
    ) {
        (Ok(address), Ok(signature)) => verify_challenge(&artifact.challenge, &address, &signature),
        _ => false,
    };
    Ok(proof_ok && identity_ok)
}
