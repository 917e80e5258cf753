use std::path::Path;

use log::info;

use super::write_output;
use crate::hash::{digest_from_hex, digest_to_hex};
use crate::merkle::MerkleProof;
use crate::service::DomainTree;

/// Builds the proof for leaf `index` of the first `count` primes.
///
/// Returns the proof JSON and also writes it to `output` when given.
pub fn run_prove(count: usize, index: usize, output: Option<&Path>) -> Result<String, String> {
    let domain = DomainTree::build(count).map_err(|e| e.to_string())?;
    let proof = domain.tree.prove(index).map_err(|e| e.to_string())?;
    info!(
        "proof for prime {} at index {index}: {} siblings, root {}",
        domain.values[index],
        proof.siblings.len(),
        digest_to_hex(&domain.root())
    );
    let json = proof.to_json_string();
    if let Some(path) = output {
        write_output(path, json.as_bytes())?;
        info!("proof written to {}", path.display());
    }
    Ok(json)
}

/// Checks a proof file against `root`, or against the root of the first
/// `count` primes when no root is given.
pub fn run_verify_proof(proof_path: &Path, root: Option<&str>, count: usize) -> Result<bool, String> {
    let raw = std::fs::read_to_string(proof_path)
        .map_err(|e| format!("failed to read {}: {e}", proof_path.display()))?;
    let proof = MerkleProof::from_json_str(&raw).map_err(|e| e.to_string())?;
    let root = match root {
        Some(hex) => digest_from_hex(hex)?,
        None => {
            let domain = DomainTree::build(count).map_err(|e| e.to_string())?;
            info!(
                "checking against the root of the first {count} primes: {}",
                digest_to_hex(&domain.root())
            );
            domain.root()
        }
    };
    Ok(proof.verify(&root))
}
