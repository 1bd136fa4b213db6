#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use vouch::crypto::{PublicKeySet, SecretKey, SignatureChecker};
use vouch::store::{LocalStore, MemoryStore, Store, StoreResult};
use vouch::types::{PathInfo, StorePath, DEFAULT_STORE_DIR};
use vouch::verify::{CounterSnapshot, Diagnostic, ProgressSink};

/// Deterministic signing key
pub fn key(name: &str, seed: u8) -> SecretKey {
    SecretKey::from_seed(name, &[seed; 32]).unwrap()
}

pub fn key_set(keys: &[&SecretKey]) -> PublicKeySet {
    PublicKeySet::from_keys(keys.iter().map(|k| k.to_public_key()))
}

/// A memory store that has a copy of `info` signed by `signer`
pub fn mirror_signed_by(name: &str, info: &PathInfo, signer: &SecretKey) -> MemoryStore {
    let store = MemoryStore::new(name);
    let mut remote = info.clone();
    remote.sigs.clear();
    remote.sign(signer);
    store.insert(remote, Vec::new());
    store
}

/// Progress sink that keeps everything it is told
#[derive(Default)]
pub struct RecordingProgress {
    pub statuses: Mutex<Vec<String>>,
    pub diagnostics: Mutex<Vec<Diagnostic>>,
    pub summary: Mutex<Option<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics().iter().map(|d| d.to_string()).collect()
    }

    pub fn substituter_failures(&self) -> usize {
        self.diagnostics()
            .iter()
            .filter(|d| matches!(d, Diagnostic::SubstituterFailed { .. }))
            .count()
    }
}

impl ProgressSink for RecordingProgress {
    fn update_status(&self, snapshot: &CounterSnapshot, total: usize) {
        self.statuses.lock().push(snapshot.status_line(total));
    }

    fn report(&self, diagnostic: &Diagnostic) {
        self.diagnostics.lock().push(diagnostic.clone());
    }

    fn finish(&self, snapshot: &CounterSnapshot, total: usize) {
        *self.summary.lock() = Some(snapshot.summary_line(total));
    }
}

/// Signature checker that counts how often it is consulted
pub struct CountingChecker {
    inner: PublicKeySet,
    calls: AtomicUsize,
}

impl CountingChecker {
    pub fn new(inner: PublicKeySet) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignatureChecker for CountingChecker {
    fn verify(&self, fingerprint: &str, signature: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(fingerprint, signature)
    }
}

/// Store wrapper that panics when asked about one particular path
pub struct PanickingStore {
    pub inner: MemoryStore,
    pub poisoned: StorePath,
}

impl Store for PanickingStore {
    fn uri(&self) -> String {
        self.inner.uri()
    }

    fn is_valid_path(&self, path: &StorePath) -> StoreResult<bool> {
        self.inner.is_valid_path(path)
    }

    fn query_path_info(&self, path: &StorePath) -> StoreResult<PathInfo> {
        if path == &self.poisoned {
            panic!("metadata for {} is poisoned", path);
        }
        self.inner.query_path_info(path)
    }

    fn nar_from_path(&self, path: &StorePath, sink: &mut dyn Write) -> StoreResult<()> {
        self.inner.nar_from_path(path, sink)
    }

    fn query_all_valid_paths(&self) -> StoreResult<Vec<StorePath>> {
        self.inner.query_all_valid_paths()
    }
}

/// On-disk fixture for command-line tests
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub store: LocalStore,
    pub config_file: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let store = LocalStore::init(temp_dir.path().join("store"), DEFAULT_STORE_DIR)?;
        let config_file = temp_dir.path().join("config.toml");
        fs::write(&config_file, "")?;

        Ok(Self {
            temp_dir,
            store,
            config_file,
        })
    }

    pub fn store_root(&self) -> &Path {
        self.store.root()
    }

    /// Add a single-file path to the store
    pub fn add_file(&self, name: &str, contents: &[u8]) -> Result<PathInfo> {
        let source = self.temp_dir.path().join(format!("src-{}", name));
        fs::write(&source, contents)?;
        Ok(self.store.add_path(name, &source)?)
    }

    pub fn write_config(&self, contents: &str) -> Result<()> {
        fs::write(&self.config_file, contents)?;
        Ok(())
    }

    /// `vouch` with an isolated environment and this store selected
    pub fn cmd(&self) -> Command {
        let mut cmd = vouch_cmd();
        cmd.env("VOUCH_CONFIG", &self.config_file)
            .arg("--store")
            .arg(self.store_root());
        cmd
    }
}

/// `vouch` binary with no ambient configuration
pub fn vouch_cmd() -> Command {
    let mut cmd = Command::cargo_bin("vouch").unwrap();
    cmd.env_remove("VOUCH_STORE")
        .env_remove("VOUCH_LOG")
        .env_remove("VOUCH_CONFIG")
        .env("NO_COLOR", "1");
    cmd
}
