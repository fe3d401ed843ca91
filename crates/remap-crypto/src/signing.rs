//! Ed25519 signing and verification of Coordinator challenges.
//!
//! The signing primitive is a capability: the agent only sees the
//! [`ChallengeSigner`] trait, so tests can substitute a fake.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::keys::{CryptoError, KeyMaterial};

/// Length of an Ed25519 seed.
const SEED_LEN: usize = 32;

/// Length of the expanded (`seed || public key`) form some key stores write.
const EXPANDED_LEN: usize = 64;

/// Sign/verify capability used to prove possession of the AS key.
pub trait ChallengeSigner {
    /// Sign `data` with the private key in `key`. Deterministic.
    fn sign(&self, data: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, CryptoError>;

    /// Check `signature` over `data` against a raw public key.
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool;

    /// Public key belonging to the private key in `key`.
    fn public_key(&self, key: &KeyMaterial) -> Result<Vec<u8>, CryptoError>;
}

/// Ed25519 over 32-byte seeds, the key format of SCION AS signing keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    fn signing_key(key: &KeyMaterial) -> Result<SigningKey, CryptoError> {
        let bytes = key.as_bytes();
        match bytes.len() {
            SEED_LEN | EXPANDED_LEN => {
                let mut seed = [0u8; SEED_LEN];
                seed.copy_from_slice(&bytes[..SEED_LEN]);
                let signing_key = SigningKey::from_bytes(&seed);
                zeroize::Zeroize::zeroize(&mut seed);

                if bytes.len() == EXPANDED_LEN
                    && signing_key.verifying_key().as_bytes() != &bytes[SEED_LEN..]
                {
                    return Err(CryptoError::MalformedKey(
                        "expanded key does not match its seed".into(),
                    ));
                }
                Ok(signing_key)
            }
            other => Err(CryptoError::MalformedKey(format!(
                "expected a {SEED_LEN}-byte Ed25519 seed, got {other} bytes"
            ))),
        }
    }
}

impl ChallengeSigner for Ed25519Signer {
    fn sign(&self, data: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
        let signing_key = Self::signing_key(key)?;
        let sig: Signature = signing_key.sign(data);
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(public_key) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let verifying_key = match VerifyingKey::from_bytes(&public_key) {
            Ok(k) => k,
            Err(_) => return false,
        };

        let sig = match Signature::from_slice(signature) {
            Ok(s) => s,
            Err(_) => return false,
        };

        verifying_key.verify(data, &sig).is_ok()
    }

    fn public_key(&self, key: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
        let signing_key = Self::signing_key(key)?;
        Ok(signing_key.verifying_key().to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> KeyMaterial {
        KeyMaterial::from_bytes(vec![seed; SEED_LEN])
    }

    #[test]
    fn sign_verify_round_trip() {
        let signer = Ed25519Signer;
        let key = key(1);
        let challenge = b"ABC";

        let signature = signer.sign(challenge, &key).unwrap();
        let public = signer.public_key(&key).unwrap();

        assert!(signer.verify(challenge, &signature, &public));
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = Ed25519Signer;
        let key = key(2);
        let a = signer.sign(b"challenge", &key).unwrap();
        let b = signer.sign(b"challenge", &key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = Ed25519Signer;
        let signature = signer.sign(b"data", &key(3)).unwrap();
        let wrong_public = signer.public_key(&key(4)).unwrap();
        assert!(!signer.verify(b"data", &signature, &wrong_public));
    }

    #[test]
    fn tampered_data_fails_verification() {
        let signer = Ed25519Signer;
        let key = key(5);
        let signature = signer.sign(b"original", &key).unwrap();
        let public = signer.public_key(&key).unwrap();
        assert!(!signer.verify(b"tampered", &signature, &public));
    }

    #[test]
    fn truncated_signature_fails_verification() {
        let signer = Ed25519Signer;
        let key = key(6);
        let signature = signer.sign(b"data", &key).unwrap();
        let public = signer.public_key(&key).unwrap();
        assert!(!signer.verify(b"data", &signature[..32], &public));
        assert!(!signer.verify(b"data", &[], &public));
    }

    #[test]
    fn invalid_public_key_length_returns_false() {
        let signer = Ed25519Signer;
        let signature = signer.sign(b"data", &key(7)).unwrap();
        assert!(!signer.verify(b"data", &signature, &[0u8; 10]));
    }

    #[test]
    fn sign_large_binary_challenge() {
        let signer = Ed25519Signer;
        let key = key(8);
        let data: Vec<u8> = (0..512).map(|i| (i % 256) as u8).collect();
        let signature = signer.sign(&data, &key).unwrap();
        let public = signer.public_key(&key).unwrap();
        assert!(signer.verify(&data, &signature, &public));
    }

    #[test]
    fn expanded_key_signs_like_its_seed() {
        let signer = Ed25519Signer;
        let seed = key(9);
        let mut expanded = seed.as_bytes().to_vec();
        expanded.extend(signer.public_key(&seed).unwrap());
        let expanded = KeyMaterial::from_bytes(expanded);

        assert_eq!(
            signer.sign(b"data", &seed).unwrap(),
            signer.sign(b"data", &expanded).unwrap()
        );
    }

    #[test]
    fn expanded_key_with_foreign_public_half_is_rejected() {
        let signer = Ed25519Signer;
        let mut bytes = vec![10u8; SEED_LEN];
        bytes.extend(vec![0u8; SEED_LEN]);
        let err = signer
            .sign(b"data", &KeyMaterial::from_bytes(bytes))
            .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedKey(_)));
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let signer = Ed25519Signer;
        let err = signer
            .sign(b"data", &KeyMaterial::from_bytes(vec![0u8; 16]))
            .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedKey(_)));
    }
}
