//! Recorded metadata for a store path
use crate::crypto::SecretKey;
use crate::types::{Hash, StorePath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub path: StorePath,
    /// Hash of the path's NAR serialization
    pub nar_hash: Hash,
    pub nar_size: u64,
    #[serde(default)]
    pub references: BTreeSet<StorePath>,
    #[serde(default)]
    pub deriver: Option<StorePath>,
    /// The owning store vouches for this path without signatures
    #[serde(default)]
    pub ultimate: bool,
    #[serde(default)]
    pub sigs: BTreeSet<String>,
}

impl PathInfo {
    pub fn new(path: StorePath, nar_hash: Hash, nar_size: u64) -> Self {
        Self {
            path,
            nar_hash,
            nar_size,
            references: BTreeSet::new(),
            deriver: None,
            ultimate: false,
            sigs: BTreeSet::new(),
        }
    }

    /// The string that signatures are made over.
    ///
    /// Format: `1;{path};{nar_hash};{nar_size};{refs}` with refs comma-separated.
    pub fn fingerprint(&self) -> String {
        let refs: Vec<&str> = self.references.iter().map(StorePath::as_str).collect();
        format!(
            "1;{};{};{};{}",
            self.path,
            self.nar_hash,
            self.nar_size,
            refs.join(",")
        )
    }

    pub fn sign(&mut self, key: &SecretKey) {
        let sig = key.sign(&self.fingerprint());
        self.sigs.insert(sig);
    }
}
