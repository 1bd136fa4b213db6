//! Store path verification.
//!
//! [`Verifier`] runs a content check and a trust check for every requested
//! path on a bounded worker pool, folds the per-path results into
//! [`AggregateCounters`] and reports the run as a [`VerifyOutcome`] bitmask.

pub mod content;
pub mod counters;
pub mod engine;
pub mod progress;
pub mod trust;

use parking_lot::Mutex;

pub use content::{verify_contents, ContentCheck};
pub use counters::{AggregateCounters, CounterSnapshot, PathOutcome, VerifyOutcome};
pub use engine::{CancellationToken, Verifier, VerifySummary};
pub use progress::{Diagnostic, ProgressSink, SilentProgress};
pub use trust::{TrustDecision, TrustVerifier};

use crate::core::config::VerifyConfig;
use crate::error::{VouchError, VouchResult};
use crate::store::{open_store, Store};

/// An opened peer store consulted for extra signatures
pub struct Substituter {
    store: Box<dyn Store>,
    /// Present when the store must not be queried from several tasks at once
    guard: Option<Mutex<()>>,
}

impl Substituter {
    pub fn new(store: Box<dyn Store>) -> Self {
        let guard = if store.supports_concurrent_access() {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self { store, guard }
    }

    pub fn open(uri: &str, store_dir: &str) -> VouchResult<Self> {
        let store = open_store(uri, store_dir).map_err(|e| {
            VouchError::Configuration(format!("cannot open substituter '{}': {}", uri, e))
        })?;
        Ok(Self::new(store))
    }

    pub fn uri(&self) -> String {
        self.store.uri()
    }

    pub fn is_serialized(&self) -> bool {
        self.guard.is_some()
    }

    /// Run `f` against the store, holding the per-handle lock if one is needed
    pub fn with_access<R>(&self, f: impl FnOnce(&dyn Store) -> R) -> R {
        let _lock = self.guard.as_ref().map(|guard| guard.lock());
        f(self.store.as_ref())
    }
}

impl std::fmt::Debug for Substituter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Substituter")
            .field("uri", &self.uri())
            .field("serialized", &self.is_serialized())
            .finish()
    }
}

/// Settings for one run, shared read-only by every task
#[derive(Debug)]
pub struct VerificationConfig {
    pub check_contents: bool,
    pub check_trust: bool,
    /// 0 means one signature unless the path is ultimate
    pub sigs_needed: usize,
    /// Consulted in this order
    pub substituters: Vec<Substituter>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            check_contents: true,
            check_trust: true,
            sigs_needed: 0,
            substituters: Vec::new(),
        }
    }
}

impl VerificationConfig {
    /// Build the run settings, opening every configured substituter up front
    pub fn open(config: &VerifyConfig, store_dir: &str) -> VouchResult<Self> {
        let substituters = config
            .substituters
            .iter()
            .map(|uri| Substituter::open(uri, store_dir))
            .collect::<VouchResult<Vec<_>>>()?;

        Ok(Self {
            check_contents: config.check_contents,
            check_trust: config.check_trust,
            sigs_needed: config.sigs_needed,
            substituters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::DEFAULT_STORE_DIR;

    #[test]
    fn test_substituter_guard_follows_store() {
        let concurrent = Substituter::new(Box::new(MemoryStore::new("a")));
        assert!(!concurrent.is_serialized());

        let serialized = Substituter::new(Box::new(MemoryStore::new("b").serialized()));
        assert!(serialized.is_serialized());
        assert_eq!(serialized.with_access(|store| store.uri()), "memory://b");
    }

    #[test]
    fn test_open_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = VerifyConfig {
            check_contents: false,
            check_trust: true,
            substituters: vec![format!("file://{}", dir.path().display())],
            sigs_needed: 2,
        };

        let opened = VerificationConfig::open(&config, DEFAULT_STORE_DIR).unwrap();
        assert!(!opened.check_contents);
        assert_eq!(opened.sigs_needed, 2);
        assert_eq!(opened.substituters.len(), 1);
    }

    #[test]
    fn test_bad_substituter_is_configuration_error() {
        let config = VerifyConfig {
            substituters: vec!["gopher://old.example.org".to_string()],
            ..VerifyConfig::default()
        };
        assert!(matches!(
            VerificationConfig::open(&config, DEFAULT_STORE_DIR),
            Err(VouchError::Configuration(_))
        ));
    }
}
