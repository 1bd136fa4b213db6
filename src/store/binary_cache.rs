//! Binary cache stores: flat key/value caches of `.narinfo` and NAR files,
//! reached over HTTP or on the local filesystem.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use super::narinfo::NarInfo;
use super::{Store, StoreError, StoreResult};
use crate::error::{VouchError, VouchResult};
use crate::types::{Hash, HashAlgorithm, PathInfo, StorePath};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches cache files by key
pub trait CacheTransport: Send + Sync {
    /// `Ok(None)` when the cache has no such file
    fn fetch(&self, key: &str) -> StoreResult<Option<Box<dyn Read + Send>>>;

    /// Locator of the cache root
    fn describe(&self) -> String;
}

pub struct HttpTransport {
    base: Url,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(mut base: Url) -> VouchResult<Self> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("vouch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VouchError::Other(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { base, client })
    }
}

impl CacheTransport for HttpTransport {
    fn fetch(&self, key: &str) -> StoreResult<Option<Box<dyn Read + Send>>> {
        let network = |message: String| StoreError::Network {
            uri: self.describe(),
            message,
        };

        let url = self
            .base
            .join(key)
            .map_err(|e| network(format!("invalid key '{}': {}", key, e)))?;

        tracing::trace!(%url, "fetching from binary cache");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| network(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(network(format!("GET {} returned status {}", url, status)));
        }
        Ok(Some(Box::new(response)))
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CacheTransport for FileTransport {
    fn fetch(&self, key: &str) -> StoreResult<Option<Box<dyn Read + Send>>> {
        let file = self.root.join(key);
        match fs::File::open(&file) {
            Ok(f) => Ok(Some(Box::new(f))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(file.display(), e)),
        }
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

pub struct BinaryCacheStore<T: CacheTransport> {
    transport: T,
    store_dir: String,
    /// Narinfo fetched by the last `is_valid_path`, used once by the next query
    recent: Mutex<Option<NarInfo>>,
}

impl<T: CacheTransport> BinaryCacheStore<T> {
    pub fn new(transport: T, store_dir: &str) -> Self {
        Self {
            transport,
            store_dir: store_dir.trim_end_matches('/').to_string(),
            recent: Mutex::new(None),
        }
    }

    /// The narinfo for `path`, from the last presence check if it was for
    /// the same path, otherwise from the cache
    fn take_narinfo(&self, path: &StorePath) -> StoreResult<NarInfo> {
        {
            let mut recent = self.recent.lock();
            if let Some(narinfo) = recent.take() {
                if &narinfo.info.path == path {
                    return Ok(narinfo);
                }
                *recent = Some(narinfo);
            }
        }
        self.fetch_narinfo(path)
    }

    fn fetch_narinfo(&self, path: &StorePath) -> StoreResult<NarInfo> {
        if path.store_dir() != self.store_dir {
            return Err(StoreError::NotFound(path.to_string()));
        }

        let key = format!("{}.narinfo", path.hash_part());
        let mut reader = self
            .transport
            .fetch(&key)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(|e| StoreError::Network {
            uri: self.uri(),
            message: format!("reading {}: {}", key, e),
        })?;

        let narinfo = NarInfo::parse(&text, &self.uri())?;
        if &narinfo.info.path != path {
            return Err(StoreError::Protocol {
                uri: self.uri(),
                message: format!(
                    "{} describes '{}' instead of '{}'",
                    key, narinfo.info.path, path
                ),
            });
        }
        Ok(narinfo)
    }
}

impl BinaryCacheStore<FileTransport> {
    /// Publish a path with an uncompressed NAR into a file-backed cache
    pub fn upload(&self, info: &PathInfo, nar: &[u8]) -> VouchResult<()> {
        let root = &self.transport.root;
        fs::create_dir_all(root.join("nar"))?;

        let file_hash = Hash::compute(HashAlgorithm::Sha256, nar);
        let nar_key = format!("nar/{}.nar", file_hash.to_nix32());
        fs::write(root.join(&nar_key), nar)?;

        let mut narinfo = NarInfo::new(info.clone());
        narinfo.url = Some(nar_key);
        narinfo.file_hash = Some(file_hash);
        narinfo.file_size = Some(nar.len() as u64);

        let key = format!("{}.narinfo", info.path.hash_part());
        fs::write(root.join(key), narinfo.render())?;
        Ok(())
    }
}

impl<T: CacheTransport> Store for BinaryCacheStore<T> {
    fn uri(&self) -> String {
        self.transport.describe()
    }

    fn is_valid_path(&self, path: &StorePath) -> StoreResult<bool> {
        match self.fetch_narinfo(path) {
            Ok(narinfo) => {
                *self.recent.lock() = Some(narinfo);
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn query_path_info(&self, path: &StorePath) -> StoreResult<PathInfo> {
        self.take_narinfo(path).map(|narinfo| narinfo.info)
    }

    fn nar_from_path(&self, path: &StorePath, sink: &mut dyn Write) -> StoreResult<()> {
        let narinfo = self.take_narinfo(path)?;
        let url = narinfo.url.ok_or_else(|| StoreError::Protocol {
            uri: self.uri(),
            message: format!("narinfo for '{}' has no URL", path),
        })?;
        let reader = self
            .transport
            .fetch(&url)?
            .ok_or_else(|| StoreError::NotFound(format!("{} ({})", path, url)))?;
        let mut reader = decompress(&narinfo.compression, reader).map_err(|e| match e {
            Some(e) => StoreError::Protocol {
                uri: self.uri(),
                message: format!("decoding {}: {}", url, e),
            },
            None => StoreError::Unsupported {
                uri: self.uri(),
                operation: format!("{} compressed NARs", narinfo.compression),
            },
        })?;

        io::copy(&mut reader, sink).map_err(|e| StoreError::Network {
            uri: self.uri(),
            message: format!("streaming {}: {}", url, e),
        })?;
        Ok(())
    }

    fn query_all_valid_paths(&self) -> StoreResult<Vec<StorePath>> {
        Err(StoreError::Unsupported {
            uri: self.uri(),
            operation: "enumerating paths".to_string(),
        })
    }
}

/// Wrap `reader` in a decoder for a narinfo `Compression` value.
///
/// `Err(None)` means the compression is not supported.
fn decompress(
    compression: &str,
    reader: Box<dyn Read + Send>,
) -> Result<Box<dyn Read + Send>, Option<io::Error>> {
    Ok(match compression {
        "none" => reader,
        "xz" => Box::new(xz2::read::XzDecoder::new(reader)),
        "bzip2" => Box::new(bzip2::read::BzDecoder::new(reader)),
        "zstd" => Box::new(zstd::stream::read::Decoder::new(reader).map_err(Some)?),
        "gzip" => Box::new(flate2::read::GzDecoder::new(reader)),
        _ => return Err(None),
    })
}
