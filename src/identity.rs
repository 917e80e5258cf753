//! Challenge/response proof of key possession with secp256k1 signatures.
//!
//! The prover signs a one-time challenge string; the verifier recovers the
//! signer's address from the signature and compares it to the claimed one.
//! Both sides frame the challenge as an EIP-191 personal message
//! (`"\x19Ethereum Signed Message:\n" || len || text`) and hash it with
//! Keccak-256 before signing or recovering, so the recovered address matches
//! what wallet tooling and contracts expect.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use log::debug;
use rand::Rng;

use crate::error::{ClaimError, Result};
use crate::hash::{keccak256, Digest};

/// Prefix of the EIP-191 version `0x45` personal message framing.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Default challenge length in characters.
pub const CHALLENGE_LEN: usize = 32;

/// Length in bytes of a recoverable signature (`r || s || v`).
pub const SIGNATURE_LEN: usize = 65;

const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Frames `message` as a personal message and hashes it.
pub fn personal_message_hash(message: &str) -> Digest {
    let framed = format!("{PERSONAL_MESSAGE_PREFIX}{}{message}", message.len());
    keccak256(framed.as_bytes())
}

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Derives the address of a public key: the low 20 bytes of the
    /// Keccak-256 hash of the uncompressed point without its `0x04` tag.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }

    /// Renders the address in EIP-55 mixed-case checksum form.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (idx, ch) in lower.chars().enumerate() {
            let nibble = (hash[idx / 2] >> if idx % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = ClaimError;

    /// Parses hex in any letter case, with or without `0x`.
    fn from_str(input: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(input))
            .map_err(|err| ClaimError::Decode(format!("invalid address hex: {err}")))?;
        let raw: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| {
                ClaimError::Decode(format!("address must be 20 bytes, got {}", bytes.len()))
            })?;
        Ok(Self(raw))
    }
}

/// A 65-byte `r || s || v` signature with `v` in `{27, 28}`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature(pub [u8; SIGNATURE_LEN]);

impl RecoverableSignature {
    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a signature from hex, with or without `0x`.
    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(input))
            .map_err(|err| ClaimError::InvalidSignature(format!("invalid hex: {err}")))?;
        Self::from_slice(&bytes)
    }

    /// Copies a signature out of a byte slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            ClaimError::InvalidSignature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    fn split(&self) -> Result<(Signature, RecoveryId)> {
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|err| ClaimError::InvalidSignature(format!("bad scalars: {err}")))?;
        let v = self.0[64];
        let parity = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            other => {
                return Err(ClaimError::InvalidSignature(format!(
                    "unsupported recovery byte {other}"
                )))
            }
        };
        let recid = RecoveryId::from_byte(parity)
            .ok_or_else(|| ClaimError::InvalidSignature("invalid recovery id".into()))?;
        // Recovery only accepts low-S; the malleated twin recovers with the
        // opposite parity.
        match signature.normalize_s() {
            Some(low) => Ok((low, RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced()))),
            None => Ok((signature, recid)),
        }
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature(0x{})", self.to_hex())
    }
}

/// A one-time random challenge string.
///
/// Not `Clone`: each challenge is meant for a single verification round.
#[derive(Debug, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    /// Draws `len` random ASCII letters.
    pub fn random<R: Rng>(rng: &mut R, len: usize) -> Self {
        let text = (0..len)
            .map(|_| ASCII_LETTERS[rng.gen_range(0..ASCII_LETTERS.len())] as char)
            .collect();
        Self(text)
    }

    /// Wraps a challenge issued by a counterparty.
    pub fn from_issued(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The challenge text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of answering a challenge: the signer's address and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityProof {
    /// Address derived from the signer's public key.
    pub address: Address,
    /// Signature over the framed challenge.
    pub signature: RecoverableSignature,
}

/// Signing capability: produces an address and a signature over a message.
pub trait MessageSigner {
    /// Address of the held key.
    fn address(&self) -> Address;

    /// Signs the personal-message framing of `message`.
    fn sign_message(&self, message: &str) -> Result<RecoverableSignature>;

    /// Signs a challenge and bundles the result with the address.
    fn answer(&self, challenge: &Challenge) -> Result<IdentityProof> {
        Ok(IdentityProof {
            address: self.address(),
            signature: self.sign_message(challenge.as_str())?,
        })
    }
}

/// A held secp256k1 secret key.
///
/// Not `Clone`; `Debug` shows only the address.
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    /// Parses a 32-byte secret key from hex (optional `0x`, surrounding
    /// whitespace ignored).
    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(input))
            .map_err(|_| ClaimError::InvalidKey("secret key is not valid hex".into()))?;
        Self::from_bytes(&bytes)
    }

    /// Builds an identity from raw secret key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ClaimError::InvalidKey(format!(
                "secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| ClaimError::InvalidKey("secret key is not a valid scalar".into()))?;
        let address = Address::from_verifying_key(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Reads the first line of a key file and parses it as hex.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ClaimError::InvalidKey(format!("cannot read {}: {err}", path.display()))
        })?;
        let line = contents.lines().next().unwrap_or_default();
        let identity = Self::from_hex(line)?;
        debug!("loaded signing identity {}", identity.address);
        Ok(identity)
    }

    /// Generates a fresh random identity.
    pub fn random<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        let key = SigningKey::random(rng);
        let address = Address::from_verifying_key(key.verifying_key());
        Self { key, address }
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl MessageSigner for SigningIdentity {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_message(&self, message: &str) -> Result<RecoverableSignature> {
        let prehash = personal_message_hash(message);
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(&prehash)
            .map_err(|err| ClaimError::SigningFailed(err.to_string()))?;
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recid.to_byte();
        Ok(RecoverableSignature(out))
    }
}

/// Recovery capability: returns the address that signed `message`.
pub fn recover_address(message: &str, signature: &RecoverableSignature) -> Result<Address> {
    let (sig, recid) = signature.split()?;
    let prehash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recid)
        .map_err(|err| ClaimError::InvalidSignature(format!("recovery failed: {err}")))?;
    Ok(Address::from_verifying_key(&key))
}

/// Checks that `signature` over `challenge` was produced by `claimed`.
///
/// Malformed signatures yield `false`.
pub fn verify_challenge(challenge: &str, claimed: &Address, signature: &RecoverableSignature) -> bool {
    match recover_address(challenge, signature) {
        Ok(recovered) => recovered == *claimed,
        Err(err) => {
            debug!("challenge verification failed: {err}");
            false
        }
    }
}

/// [`verify_challenge`] over hex-encoded signature and address strings.
pub fn verify_challenge_hex(challenge: &str, claimed: &str, signature_hex: &str) -> bool {
    let Ok(address) = claimed.parse::<Address>() else {
        return false;
    };
    match RecoverableSignature::from_hex(signature_hex) {
        Ok(signature) => verify_challenge(challenge, &address, &signature),
        Err(_) => false,
    }
}

fn strip_hex_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn key_one_known_address() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            identity.address().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn sign_and_recover_roundtrip() {
        let identity = SigningIdentity::random(&mut StdRng::seed_from_u64(7));
        let challenge = Challenge::random(&mut StdRng::seed_from_u64(8), CHALLENGE_LEN);
        let proof = identity.answer(&challenge).unwrap();
        assert!(matches!(proof.signature.0[64], 27 | 28));
        assert!(verify_challenge(challenge.as_str(), &proof.address, &proof.signature));
        assert_eq!(
            recover_address(challenge.as_str(), &proof.signature).unwrap(),
            identity.address()
        );
    }

    #[test]
    fn altered_challenge_or_address_fails() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        let proof = identity.answer(&Challenge::from_issued("abcdef")).unwrap();
        assert!(!verify_challenge("abcdeg", &proof.address, &proof.signature));
        let other = SigningIdentity::random(&mut StdRng::seed_from_u64(1)).address();
        assert!(!verify_challenge("abcdef", &other, &proof.signature));
    }

    #[test]
    fn malformed_signatures_return_false() {
        let address = SigningIdentity::from_hex(KEY_ONE).unwrap().address();
        assert!(!verify_challenge_hex("x", &address.to_string(), "0x1234"));
        assert!(!verify_challenge_hex("x", &address.to_string(), "zz"));
        let zeros = RecoverableSignature([0u8; SIGNATURE_LEN]);
        assert!(!verify_challenge("x", &address, &zeros));
        assert!(matches!(
            recover_address("x", &zeros),
            Err(ClaimError::InvalidSignature(_))
        ));
    }

    #[test]
    fn hex_forms_are_interchangeable() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        let sig = identity.sign_message("hello").unwrap();
        let addr = identity.address().to_string();
        assert!(verify_challenge_hex("hello", &addr, &sig.to_hex()));
        assert!(verify_challenge_hex(
            "hello",
            &addr.to_lowercase(),
            &format!("0x{}", sig.to_hex())
        ));
    }

    #[test]
    fn raw_parity_byte_is_accepted() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        let mut sig = identity.sign_message("parity").unwrap();
        sig.0[64] -= 27;
        assert!(verify_challenge("parity", &identity.address(), &sig));
    }

    const CURVE_ORDER: [u8; 32] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
        0x41, 0x41,
    ];

    fn negate_s(sig: &RecoverableSignature) -> RecoverableSignature {
        let mut out = sig.0;
        let mut borrow = 0i16;
        for idx in (0..32).rev() {
            let mut diff = CURVE_ORDER[idx] as i16 - sig.0[32 + idx] as i16 - borrow;
            borrow = 0;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            }
            out[32 + idx] = diff as u8;
        }
        out[64] = if sig.0[64] == 27 { 28 } else { 27 };
        RecoverableSignature(out)
    }

    #[test]
    fn high_s_twin_recovers_same_address() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        let sig = identity.sign_message("hello").unwrap();
        let twin = negate_s(&sig);
        assert_ne!(twin.0[32..64], sig.0[32..64]);
        assert_eq!(
            recover_address("hello", &twin).unwrap(),
            identity.address()
        );
        assert!(verify_challenge("hello", &identity.address(), &twin));
        assert!(!verify_challenge("hellp", &identity.address(), &twin));
    }

    #[test]
    fn debug_output_hides_secret() {
        let identity = SigningIdentity::from_hex(KEY_ONE).unwrap();
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("address"));
        assert!(!rendered.contains("0000000000000001"));
    }

    #[test]
    fn invalid_keys_are_rejected() {
        assert!(matches!(
            SigningIdentity::from_hex("0x00"),
            Err(ClaimError::InvalidKey(_))
        ));
        assert!(matches!(
            SigningIdentity::from_hex(&"00".repeat(32)),
            Err(ClaimError::InvalidKey(_))
        ));
        assert!(SigningIdentity::from_hex("not hex").is_err());
    }

    #[test]
    fn challenges_are_ascii_letters() {
        let challenge = Challenge::random(&mut StdRng::seed_from_u64(3), CHALLENGE_LEN);
        assert_eq!(challenge.as_str().len(), CHALLENGE_LEN);
        assert!(challenge.as_str().chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn personal_message_framing() {
        let expected = keccak256(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(personal_message_hash("hello"), expected);
    }
}
