//! Algorithm-tagged content hashes
use crate::error::{VouchError, VouchResult};
use crate::types::base32;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash algorithms a recorded content hash may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest size in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = VouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(VouchError::InvalidHash(format!(
                "unsupported hash algorithm '{}'",
                other
            ))),
        }
    }
}

/// A digest together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Hash {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> VouchResult<Self> {
        if digest.len() != algorithm.digest_len() {
            return Err(VouchError::InvalidHash(format!(
                "{} digest must be {} bytes, got {}",
                algorithm,
                algorithm.digest_len(),
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// Hash an in-memory buffer
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data);
        hasher.finish()
    }

    /// Parse `<algo>:<digest>` (base16, nix base-32 or base64) or SRI `<algo>-<base64>`
    pub fn parse(text: &str) -> VouchResult<Self> {
        if let Some((algo, digest)) = text.split_once(':') {
            let algorithm: HashAlgorithm = algo.parse()?;
            return Self::parse_digest(algorithm, digest)
                .ok_or_else(|| VouchError::InvalidHash(text.to_string()));
        }

        if let Some((algo, digest)) = text.split_once('-') {
            let algorithm: HashAlgorithm = algo.parse()?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(digest)
                .map_err(|_| VouchError::InvalidHash(text.to_string()))?;
            return Self::new(algorithm, bytes);
        }

        Err(VouchError::InvalidHash(format!(
            "'{}' has no algorithm prefix",
            text
        )))
    }

    fn parse_digest(algorithm: HashAlgorithm, digest: &str) -> Option<Self> {
        let size = algorithm.digest_len();
        let bytes = if digest.len() == size * 2 {
            hex::decode(digest).ok()?
        } else if digest.len() == base32::encoded_len(size) {
            base32::decode(digest, size)?
        } else if digest.len() == size.div_ceil(3) * 4 {
            base64::engine::general_purpose::STANDARD.decode(digest).ok()?
        } else {
            return None;
        };
        Self::new(algorithm, bytes).ok()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn to_base16(&self) -> String {
        hex::encode(&self.digest)
    }

    pub fn to_nix32(&self) -> String {
        base32::encode(&self.digest)
    }

    pub fn to_sri(&self) -> String {
        format!(
            "{}-{}",
            self.algorithm,
            base64::engine::general_purpose::STANDARD.encode(&self.digest)
        )
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_nix32())
    }
}

impl FromStr for Hash {
    type Err = VouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::parse(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Hash::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher for any supported algorithm
pub enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Hash {
        let (algorithm, digest) = match self {
            Hasher::Sha256(h) => (HashAlgorithm::Sha256, h.finalize().to_vec()),
            Hasher::Sha512(h) => (HashAlgorithm::Sha512, h.finalize().to_vec()),
        };
        Hash { algorithm, digest }
    }
}

/// A [`std::io::Write`] sink that hashes and counts everything written to it
pub struct HashSink {
    hasher: Hasher,
    written: u64,
}

impl HashSink {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            hasher: Hasher::new(algorithm),
            written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// The digest and the number of bytes hashed
    pub fn finish(self) -> (Hash, u64) {
        (self.hasher.finish(), self.written)
    }
}

impl std::io::Write for HashSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Fold a digest down to `size` bytes by XOR-ing overflowing bytes back in
pub fn compress_digest(digest: &[u8], size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    for (i, byte) in digest.iter().enumerate() {
        out[i % size] ^= byte;
    }
    out
}
