//! Property tests for the tree, proof and identity invariants.

use prime_claim::{
    generate_primes, hash_sorted_pair, verify_challenge, verify_proof, Challenge, Digest,
    MerkleTree, MessageSigner, SigningIdentity,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn leaves_strategy() -> impl Strategy<Value = Vec<Digest>> {
    prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..80)
}

fn odd_carries(mut len: usize, mut idx: usize) -> usize {
    let mut carries = 0;
    while len > 1 {
        if idx % 2 == 0 && idx + 1 == len {
            carries += 1;
        }
        len = (len + 1) / 2;
        idx /= 2;
    }
    carries
}

proptest! {
    #[test]
    fn primes_are_strictly_increasing_and_deterministic(n in 1usize..3000) {
        let first = generate_primes(n).unwrap();
        prop_assert_eq!(first.len(), n);
        prop_assert!(first.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(first, generate_primes(n).unwrap());
    }

    #[test]
    fn every_leaf_proof_verifies(leaves in leaves_strategy(), seed in any::<usize>()) {
        let tree = MerkleTree::build(&leaves).unwrap();
        let idx = seed % leaves.len();
        let proof = tree.prove(idx).unwrap();
        prop_assert!(verify_proof(&leaves[idx], &proof.siblings, &tree.root()));
    }

    #[test]
    fn proof_length_drops_by_odd_carries(leaves in leaves_strategy(), seed in any::<usize>()) {
        let tree = MerkleTree::build(&leaves).unwrap();
        let idx = seed % leaves.len();
        let proof = tree.prove(idx).unwrap();
        let full = tree.depth();
        prop_assert_eq!(proof.siblings.len(), full - odd_carries(leaves.len(), idx));
    }

    #[test]
    fn tampered_proof_or_leaf_fails(
        leaves in prop::collection::vec(prop::array::uniform32(any::<u8>()), 2..64),
        seed in any::<usize>(),
        byte in 0usize..32,
        flip in 1u8..=255,
    ) {
        let tree = MerkleTree::build(&leaves).unwrap();
        let idx = seed % leaves.len();
        let proof = tree.prove(idx).unwrap();
        prop_assume!(!proof.siblings.is_empty());

        let mut tampered = proof.siblings.clone();
        let at = seed % tampered.len();
        tampered[at][byte] ^= flip;
        prop_assert!(!verify_proof(&leaves[idx], &tampered, &tree.root()));

        let mut other_leaf = leaves[idx];
        other_leaf[byte] ^= flip;
        prop_assert!(!verify_proof(&other_leaf, &proof.siblings, &tree.root()));
    }

    #[test]
    fn swapping_children_keeps_parent(
        a in prop::array::uniform32(any::<u8>()),
        b in prop::array::uniform32(any::<u8>()),
    ) {
        prop_assert_eq!(hash_sorted_pair(&a, &b), hash_sorted_pair(&b, &a));
        let left = MerkleTree::build(&[a, b]).unwrap();
        let right = MerkleTree::build(&[b, a]).unwrap();
        prop_assert_eq!(left.root(), right.root());
    }

    #[test]
    fn single_leaf_root_is_leaf(leaf in prop::array::uniform32(any::<u8>())) {
        let tree = MerkleTree::build(&[leaf]).unwrap();
        prop_assert_eq!(tree.root(), leaf);
        prop_assert!(tree.prove(0).unwrap().siblings.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn identity_roundtrip_and_tamper(
        seed in any::<u64>(),
        text in "[a-zA-Z]{1,48}",
        pos in any::<usize>(),
    ) {
        let identity = SigningIdentity::random(&mut StdRng::seed_from_u64(seed));
        let answer = identity.answer(&Challenge::from_issued(text.clone())).unwrap();
        prop_assert_eq!(answer.address, identity.address());
        prop_assert!(verify_challenge(&text, &answer.address, &answer.signature));

        let mut altered: Vec<char> = text.chars().collect();
        let at = pos % altered.len();
        altered[at] = if altered[at] == 'a' { 'b' } else { 'a' };
        let altered: String = altered.into_iter().collect();
        prop_assert!(!verify_challenge(&altered, &answer.address, &answer.signature));

        let stranger = SigningIdentity::random(&mut StdRng::seed_from_u64(seed ^ 1)).address();
        prop_assert!(!verify_challenge(&text, &stranger, &answer.signature));
    }
}
