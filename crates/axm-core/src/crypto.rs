//! Ed25519 signing and verification of a shard's canonical manifest bytes
//! (spec §4.5).
//!
//! Verification never raises: a malformed key, malformed signature, or
//! mismatched signature all resolve to `Ok(false)`. Only a malformed
//! *signing* key (wrong seed length) is treated as caller error, since the
//! publisher controls that input directly.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::errors::{AxmError, AxmResult};

pub const PUBKEY_LEN: usize = 32;
pub const SIG_LEN: usize = 64;
const SEED_LEN: usize = 32;

/// Build a signing key from a raw 32-byte Ed25519 seed.
pub fn signing_key_from_seed(seed: &[u8]) -> AxmResult<SigningKey> {
    if seed.len() != SEED_LEN {
        return Err(AxmError::invalid_argument(format!(
            "private key must be exactly {SEED_LEN} bytes, got {}",
            seed.len()
        )));
    }
    let mut buf = [0u8; SEED_LEN];
    buf.copy_from_slice(seed);
    Ok(SigningKey::from_bytes(&buf))
}

/// Sign `message` (the canonical manifest bytes) with `key`.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; SIG_LEN] {
    key.sign(message).to_bytes()
}

/// Return the 32-byte public key for a signing key.
pub fn public_key_bytes(key: &SigningKey) -> [u8; PUBKEY_LEN] {
    key.verifying_key().to_bytes()
}

/// Verify a signature over `message` against a raw public key.
///
/// Returns `Ok(false)` (never an error) for any malformed input: wrong
/// public key length, wrong signature length, or a signature that simply
/// does not verify.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> AxmResult<bool> {
    if public_key.len() != PUBKEY_LEN || signature.len() != SIG_LEN {
        return Ok(false);
    }

    let mut pk_buf = [0u8; PUBKEY_LEN];
    pk_buf.copy_from_slice(public_key);
    let verifying_key = match VerifyingKey::from_bytes(&pk_buf) {
        Ok(k) => k,
        Err(_) => return Ok(false),
    };

    let mut sig_buf = [0u8; SIG_LEN];
    sig_buf.copy_from_slice(signature);
    let sig = Signature::from_bytes(&sig_buf);

    Ok(verifying_key.verify(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SEED: [u8; 32] = [7u8; 32];

    #[test]
    fn sign_then_verify_round_trips() {
        let key = signing_key_from_seed(&TEST_SEED).unwrap();
        let pk = public_key_bytes(&key);
        let sig = sign(&key, b"hello manifest");
        assert!(verify(&pk, b"hello manifest", &sig).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = signing_key_from_seed(&TEST_SEED).unwrap();
        let pk = public_key_bytes(&key);
        let sig = sign(&key, b"hello manifest");
        assert!(!verify(&pk, b"goodbye manifest", &sig).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_lengths_without_erroring() {
        let key = signing_key_from_seed(&TEST_SEED).unwrap();
        let pk = public_key_bytes(&key);
        let sig = sign(&key, b"msg");

        assert!(!verify(&pk[..10], b"msg", &sig).unwrap());
        assert!(!verify(&pk, b"msg", &sig[..10]).unwrap());
    }

    #[test]
    fn signing_key_requires_exact_seed_length() {
        assert!(signing_key_from_seed(&[1u8; 31]).is_err());
        assert!(signing_key_from_seed(&[1u8; 33]).is_err());
        assert!(signing_key_from_seed(&[1u8; 32]).is_ok());
    }
}
