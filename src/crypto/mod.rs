//! Signature verification for path metadata

pub mod keys;

pub use keys::{load_default_public_keys, PublicKey, PublicKeySet, SecretKey};

/// Decides whether a signature text is valid for a fingerprint
pub trait SignatureChecker: Send + Sync {
    fn verify(&self, fingerprint: &str, signature: &str) -> bool;
}
