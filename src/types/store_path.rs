//! Store path identifiers
use crate::error::{VouchError, VouchResult};
use crate::types::base32;
use crate::types::hash::compress_digest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the hash part of a store path's base name
pub const HASH_PART_LEN: usize = 32;

/// Bytes of digest that are encoded into the hash part
const HASH_PART_BYTES: usize = 20;

/// A full store path: `<store-dir>/<hash-part>-<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    pub fn parse(text: &str) -> VouchResult<Self> {
        let invalid = |why: &str| VouchError::InvalidStorePath(format!("'{}' {}", text, why));

        let (dir, base) = text
            .rsplit_once('/')
            .ok_or_else(|| invalid("is not an absolute path"))?;

        if !text.starts_with('/') || dir.is_empty() {
            return Err(invalid("is not inside a store directory"));
        }
        if base.len() < HASH_PART_LEN + 2 {
            return Err(invalid("has a base name that is too short"));
        }
        if !base.is_char_boundary(HASH_PART_LEN) {
            return Err(invalid("has an invalid hash part"));
        }

        let (hash_part, rest) = base.split_at(HASH_PART_LEN);
        if !hash_part.chars().all(base32::is_valid_char) {
            return Err(invalid("has an invalid hash part"));
        }

        let name = rest
            .strip_prefix('-')
            .ok_or_else(|| invalid("is missing the '-' after the hash part"))?;
        if !name.chars().all(is_valid_name_char) {
            return Err(invalid("has an invalid name"));
        }

        Ok(Self(text.to_string()))
    }

    /// Resolve a path that may be given as a bare base name
    pub fn resolve(store_dir: &str, text: &str) -> VouchResult<Self> {
        if text.starts_with('/') {
            Self::parse(text)
        } else {
            Self::parse(&format!("{}/{}", store_dir.trim_end_matches('/'), text))
        }
    }

    /// Make the path that content with the given digest gets in `store_dir`
    pub fn from_digest(store_dir: &str, name: &str, digest: &[u8]) -> VouchResult<Self> {
        let hash_part = base32::encode(&compress_digest(digest, HASH_PART_BYTES));
        Self::parse(&format!(
            "{}/{}-{}",
            store_dir.trim_end_matches('/'),
            hash_part,
            name
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn store_dir(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default()
    }

    pub fn base_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, base)| base).unwrap_or_default()
    }

    pub fn hash_part(&self) -> &str {
        &self.base_name()[..HASH_PART_LEN]
    }

    pub fn name(&self) -> &str {
        &self.base_name()[HASH_PART_LEN + 1..]
    }
}

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+-._?=".contains(c)
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorePath {
    type Error = VouchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StorePath::parse(&value)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
