//! Remap Crypto — key material and the challenge-signing capability.
//!
//! Loads the current AS signing key from its key directory and signs
//! Coordinator challenges with Ed25519.

pub mod keys;
pub mod signing;

pub use keys::{load_current_key, CryptoError, KeyMaterial};
pub use signing::{ChallengeSigner, Ed25519Signer};
