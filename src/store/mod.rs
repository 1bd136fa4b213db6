//! Store backends.
//!
//! A [`Store`] answers metadata queries and streams the archive serialization
//! of its paths. The primary store and every substituter implement the same
//! trait.

pub mod binary_cache;
pub mod local;
pub mod memory;
pub mod nar;
pub mod narinfo;

use std::io::Write;
use thiserror::Error;
use url::Url;

use crate::error::{VouchError, VouchResult};
use crate::types::{PathInfo, StorePath};

pub use binary_cache::{BinaryCacheStore, CacheTransport, FileTransport, HttpTransport};
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Errors raised by store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("path '{0}' is not valid")]
    NotFound(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("network error talking to '{uri}': {message}")]
    Network { uri: String, message: String },

    #[error("malformed data from '{uri}': {message}")]
    Protocol { uri: String, message: String },

    #[error("store '{0}' is unreachable")]
    Unreachable(String),

    #[error("store '{uri}' does not support {operation}")]
    Unsupported { uri: String, operation: String },

    #[error("unsupported store URI '{0}'")]
    UnsupportedUri(String),
}

impl StoreError {
    /// Short category used when reporting the error
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not found",
            StoreError::Io { .. } => "io",
            StoreError::Network { .. } | StoreError::Unreachable(_) => "network",
            StoreError::Protocol { .. } => "protocol",
            StoreError::Unsupported { .. } | StoreError::UnsupportedUri(_) => "unsupported",
        }
    }

    pub fn io(path: impl ToString, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_string(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store: Send + Sync {
    /// Locator used in diagnostics
    fn uri(&self) -> String;

    fn is_valid_path(&self, path: &StorePath) -> StoreResult<bool>;

    /// Fails with [`StoreError::NotFound`] if the path is unknown
    fn query_path_info(&self, path: &StorePath) -> StoreResult<PathInfo>;

    /// Write the NAR serialization of `path` into `sink`
    fn nar_from_path(&self, path: &StorePath, sink: &mut dyn Write) -> StoreResult<()>;

    fn query_all_valid_paths(&self) -> StoreResult<Vec<StorePath>>;

    /// Whether the store may be queried from several threads at once
    fn supports_concurrent_access(&self) -> bool {
        true
    }
}

/// Open a store from its URI.
///
/// `http(s)://` and `file://` address binary caches; `local://<dir>` or a bare
/// filesystem path addresses a [`LocalStore`].
pub fn open_store(uri: &str, store_dir: &str) -> VouchResult<Box<dyn Store>> {
    if !uri.contains("://") {
        return Ok(Box::new(LocalStore::open(uri, store_dir)?));
    }

    let url = Url::parse(uri)
        .map_err(|e| VouchError::Configuration(format!("invalid store URI '{}': {}", uri, e)))?;

    match url.scheme() {
        "http" | "https" => {
            let transport = HttpTransport::new(url)?;
            Ok(Box::new(BinaryCacheStore::new(transport, store_dir)))
        }
        "file" => {
            let root = url
                .to_file_path()
                .map_err(|_| StoreError::UnsupportedUri(uri.to_string()))?;
            Ok(Box::new(BinaryCacheStore::new(FileTransport::new(root), store_dir)))
        }
        "local" => Ok(Box::new(LocalStore::open(url.path(), store_dir)?)),
        _ => Err(StoreError::UnsupportedUri(uri.to_string()).into()),
    }
}
