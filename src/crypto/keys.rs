//! Ed25519 keys and detached signatures.
//!
//! Keys and signatures are text of the form `{key_name}:{base64}`:
//! public keys carry the 32-byte key, secret keys the 64-byte
//! `seed || public` pair, and signatures the 64-byte Ed25519 signature.

use base64::Engine;
use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use std::collections::HashMap;
use std::fmt;

use super::SignatureChecker;
use crate::core::config::TrustConfig;
use crate::error::{VouchError, VouchResult};

const PUBLIC_KEY_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

fn split_named<'a>(text: &'a str, what: &str) -> VouchResult<(&'a str, Vec<u8>)> {
    let (name, b64) = text
        .trim()
        .split_once(':')
        .ok_or_else(|| VouchError::InvalidKey(format!("{} is missing a key name", what)))?;
    if name.is_empty() {
        return Err(VouchError::InvalidKey(format!("{} has an empty key name", what)));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| VouchError::InvalidKey(format!("{} '{}': {}", what, name, e)))?;
    Ok((name, bytes))
}

/// A named Ed25519 public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    name: String,
    key: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    pub fn parse(text: &str) -> VouchResult<Self> {
        let (name, bytes) = split_named(text, "public key")?;
        let key: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            VouchError::InvalidKey(format!("public key '{}' must be 32 bytes", name))
        })?;
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verify a raw signature over `message`
    pub fn verify(&self, message: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(&signature::ED25519, &self.key)
            .verify(message, sig)
            .is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.name,
            base64::engine::general_purpose::STANDARD.encode(self.key)
        )
    }
}

/// A named Ed25519 signing key
pub struct SecretKey {
    name: String,
    key_pair: Ed25519KeyPair,
}

impl SecretKey {
    pub fn from_seed(name: &str, seed: &[u8; 32]) -> VouchResult<Self> {
        let key_pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| VouchError::InvalidKey(format!("secret key '{}': {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            key_pair,
        })
    }

    pub fn parse(text: &str) -> VouchResult<Self> {
        let (name, bytes) = split_named(text, "secret key")?;
        if bytes.len() != 64 {
            return Err(VouchError::InvalidKey(format!(
                "secret key '{}' must be 64 bytes",
                name
            )));
        }
        let (seed, public) = bytes.split_at(32);
        let key_pair = Ed25519KeyPair::from_seed_and_public_key(seed, public)
            .map_err(|e| VouchError::InvalidKey(format!("secret key '{}': {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            key_pair,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sign `fingerprint`, returning `{key_name}:{base64_signature}`
    pub fn sign(&self, fingerprint: &str) -> String {
        let sig = self.key_pair.sign(fingerprint.as_bytes());
        format!(
            "{}:{}",
            self.name,
            base64::engine::general_purpose::STANDARD.encode(sig.as_ref())
        )
    }

    pub fn to_public_key(&self) -> PublicKey {
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(self.key_pair.public_key().as_ref());
        PublicKey {
            name: self.name.clone(),
            key,
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Public keys indexed by key name, shared read-only by every verification task
#[derive(Debug, Clone, Default)]
pub struct PublicKeySet {
    keys: HashMap<String, PublicKey>,
}

impl PublicKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = PublicKey>) -> Self {
        let mut set = Self::new();
        for key in keys {
            set.insert(key);
        }
        set
    }

    /// Add a key, replacing any key with the same name
    pub fn insert(&mut self, key: PublicKey) {
        self.keys.insert(key.name.clone(), key);
    }

    pub fn get(&self, name: &str) -> Option<&PublicKey> {
        self.keys.get(name)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SignatureChecker for PublicKeySet {
    fn verify(&self, fingerprint: &str, signature: &str) -> bool {
        let Some((name, b64)) = signature.split_once(':') else {
            return false;
        };
        let Some(key) = self.keys.get(name) else {
            return false;
        };
        let Ok(sig) = base64::engine::general_purpose::STANDARD.decode(b64) else {
            return false;
        };
        sig.len() == SIGNATURE_LEN && key.verify(fingerprint.as_bytes(), &sig)
    }
}

/// Load the trusted keys for a run.
///
/// Combines the configured public keys with the public halves of the
/// configured secret key files.
pub fn load_default_public_keys(config: &TrustConfig) -> VouchResult<PublicKeySet> {
    let mut set = PublicKeySet::new();

    for text in &config.trusted_public_keys {
        set.insert(PublicKey::parse(text)?);
    }

    for file in &config.secret_key_files {
        let text = std::fs::read_to_string(file).map_err(|e| {
            VouchError::Configuration(format!(
                "cannot read secret key file {}: {}",
                file.display(),
                e
            ))
        })?;
        set.insert(SecretKey::parse(&text)?.to_public_key());
    }

    tracing::debug!(keys = set.len(), "loaded trusted public keys");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn key(name: &str, byte: u8) -> SecretKey {
        SecretKey::from_seed(name, &[byte; 32]).unwrap()
    }

    /// Secret key file contents for the key `key(name, byte)` would build
    fn secret_key_text(name: &str, byte: u8) -> String {
        let mut bytes = vec![byte; 32];
        bytes.extend_from_slice(key(name, byte).key_pair.public_key().as_ref());
        format!(
            "{}:{}",
            name,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_public_key_text_form() {
        let public = key("cache-1", 1).to_public_key();
        let text = public.to_string();
        assert!(text.starts_with("cache-1:"));
        assert_eq!(PublicKey::parse(&text).unwrap(), public);
    }

    #[test]
    fn test_public_key_rejects_malformed() {
        assert!(PublicKey::parse("no-colon").is_err());
        assert!(PublicKey::parse(":AAAA").is_err());
        assert!(PublicKey::parse("name:!!!").is_err());
        // 16 bytes instead of 32
        assert!(PublicKey::parse("name:AAAAAAAAAAAAAAAAAAAAAA==").is_err());
    }

    #[test]
    fn test_secret_key_text_keeps_public_half() {
        let secret = key("cache-1", 9);
        let reparsed = SecretKey::parse(&secret_key_text("cache-1", 9)).unwrap();
        assert_eq!(reparsed.to_public_key(), secret.to_public_key());
        assert_eq!(reparsed.sign("fp"), secret.sign("fp"));
    }

    #[test]
    fn test_verify_signatures() {
        let secret = key("cache-1", 1);
        let keys = PublicKeySet::from_keys(vec![secret.to_public_key()]);

        let sig = secret.sign("1;/nix/store/x;sha256:y;1;");
        assert!(keys.verify("1;/nix/store/x;sha256:y;1;", &sig));
        assert!(!keys.verify("1;/nix/store/x;sha256:y;2;", &sig));
    }

    #[test]
    fn test_unknown_or_garbled_signatures_are_invalid() {
        let trusted = key("cache-1", 1);
        let untrusted = key("other-1", 2);
        let keys = PublicKeySet::from_keys(vec![trusted.to_public_key()]);

        assert!(!keys.verify("fp", &untrusted.sign("fp")));
        assert!(!keys.verify("fp", "cache-1:not-base64!"));
        assert!(!keys.verify("fp", "cache-1:AAAA"));
        assert!(!keys.verify("fp", "no-colon"));
    }

    #[test]
    fn test_same_name_different_key_is_invalid() {
        let real = key("cache-1", 1);
        let impostor = key("cache-1", 2);
        let keys = PublicKeySet::from_keys(vec![real.to_public_key()]);
        assert!(!keys.verify("fp", &impostor.sign("fp")));
    }

    #[test]
    fn test_load_default_public_keys() {
        let configured = key("cache-1", 1);
        let local = key("local-1", 2);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", secret_key_text("local-1", 2)).unwrap();

        let config = TrustConfig {
            trusted_public_keys: vec![configured.to_public_key().to_string()],
            secret_key_files: vec![file.path().to_path_buf()],
        };

        let keys = load_default_public_keys(&config).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.verify("fp", &configured.sign("fp")));
        assert!(keys.verify("fp", &local.sign("fp")));
    }

    #[test]
    fn test_load_default_public_keys_rejects_bad_entries() {
        let config = TrustConfig {
            trusted_public_keys: vec!["garbage".to_string()],
            secret_key_files: vec![],
        };
        assert!(load_default_public_keys(&config).is_err());

        let config = TrustConfig {
            trusted_public_keys: vec![],
            secret_key_files: vec!["/nonexistent/vouch/key".into()],
        };
        assert!(matches!(
            load_default_public_keys(&config),
            Err(VouchError::Configuration(_))
        ));
    }
}
