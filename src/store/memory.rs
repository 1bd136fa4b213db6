//! In-memory store, used as a substituter double in tests and benches.
//!
//! It can simulate an unreachable remote, added latency and a backend that
//! must not be queried concurrently, and it records how it was queried.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::{Store, StoreError, StoreResult};
use crate::error::VouchResult;
use crate::types::{Hash, HashAlgorithm, PathInfo, StorePath, DEFAULT_STORE_DIR};

struct Entry {
    info: PathInfo,
    /// `None` makes reading the contents fail
    nar: Option<Vec<u8>>,
}

pub struct MemoryStore {
    name: String,
    entries: RwLock<BTreeMap<StorePath, Entry>>,
    unreachable: AtomicBool,
    serialized: bool,
    latency: Duration,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
            unreachable: AtomicBool::new(false),
            serialized: false,
            latency: Duration::ZERO,
            queries: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Declare that this store must not be queried concurrently
    pub fn serialized(mut self) -> Self {
        self.serialized = true;
        self
    }

    /// Delay every operation by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every operation fail as if the store could not be reached
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn insert(&self, info: PathInfo, nar: Vec<u8>) {
        self.entries.write().insert(
            info.path.clone(),
            Entry {
                info,
                nar: Some(nar),
            },
        );
    }

    /// Record metadata whose contents cannot be read back
    pub fn insert_unreadable(&self, info: PathInfo) {
        self.entries
            .write()
            .insert(info.path.clone(), Entry { info, nar: None });
    }

    /// Add `nar` under a path derived from its hash and return the recorded info
    pub fn add(&self, name: &str, nar: &[u8]) -> VouchResult<PathInfo> {
        let nar_hash = Hash::compute(HashAlgorithm::Sha256, nar);
        let path = StorePath::from_digest(DEFAULT_STORE_DIR, name, nar_hash.digest())?;
        let info = PathInfo::new(path, nar_hash, nar.len() as u64);
        self.insert(info.clone(), nar.to_vec());
        Ok(info)
    }

    /// Replace the stored contents of a path, keeping its recorded metadata
    pub fn tamper(&self, path: &StorePath, nar: Vec<u8>) {
        if let Some(entry) = self.entries.write().get_mut(path) {
            entry.nar = Some(nar);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of `query_path_info` calls served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Highest number of operations observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> StoreResult<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable(self.uri()));
        }
        Ok(guard)
    }
}

impl Store for MemoryStore {
    fn uri(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn is_valid_path(&self, path: &StorePath) -> StoreResult<bool> {
        let _guard = self.enter()?;
        Ok(self.entries.read().contains_key(path))
    }

    fn query_path_info(&self, path: &StorePath) -> StoreResult<PathInfo> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter()?;
        self.entries
            .read()
            .get(path)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn nar_from_path(&self, path: &StorePath, sink: &mut dyn Write) -> StoreResult<()> {
        let _guard = self.enter()?;
        let nar = match self.entries.read().get(path) {
            None => return Err(StoreError::NotFound(path.to_string())),
            Some(Entry { nar: None, .. }) => {
                return Err(StoreError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "contents unreadable"),
                ))
            }
            Some(Entry { nar: Some(nar), .. }) => nar.clone(),
        };
        sink.write_all(&nar).map_err(|e| StoreError::io(path, e))
    }

    fn query_all_valid_paths(&self) -> StoreResult<Vec<StorePath>> {
        let _guard = self.enter()?;
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn supports_concurrent_access(&self) -> bool {
        !self.serialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_query() {
        let store = MemoryStore::new("test");
        let info = store.add("hello", b"contents").unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.is_valid_path(&info.path).unwrap());
        assert_eq!(store.query_path_info(&info.path).unwrap(), info);
        assert_eq!(store.query_count(), 1);

        let mut nar = Vec::new();
        store.nar_from_path(&info.path, &mut nar).unwrap();
        assert_eq!(nar, b"contents");
        assert_eq!(store.query_all_valid_paths().unwrap(), vec![info.path]);
    }

    #[test]
    fn test_tamper_keeps_info() {
        let store = MemoryStore::new("test");
        let info = store.add("hello", b"contents").unwrap();
        store.tamper(&info.path, b"other".to_vec());

        assert_eq!(store.query_path_info(&info.path).unwrap(), info);
        let mut nar = Vec::new();
        store.nar_from_path(&info.path, &mut nar).unwrap();
        assert_eq!(nar, b"other");
    }

    #[test]
    fn test_unreachable_and_unreadable() {
        let store = MemoryStore::new("test");
        let info = store.add("hello", b"contents").unwrap();
        store.insert_unreadable(info.clone());

        let err = store.nar_from_path(&info.path, &mut std::io::sink()).unwrap_err();
        assert_eq!(err.kind(), "io");

        store.set_unreachable(true);
        assert!(matches!(
            store.query_path_info(&info.path),
            Err(StoreError::Unreachable(_))
        ));
        assert_eq!(store.query_count(), 1);
    }

    #[test]
    fn test_serialized_flag() {
        assert!(MemoryStore::new("a").supports_concurrent_access());
        assert!(!MemoryStore::new("b").serialized().supports_concurrent_access());
        assert_eq!(MemoryStore::new("c").max_in_flight(), 0);
    }
}
