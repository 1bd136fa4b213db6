//! A store kept in a local directory.
//!
//! ```text
//! <root>/store/<hash>-<name>   path contents
//! <root>/info/<hash>.json      recorded PathInfo
//! ```
//!
//! Paths added through [`LocalStore::add_path`] were built or imported
//! locally, so they are recorded as ultimately trusted.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{nar, Store, StoreError, StoreResult};
use crate::error::{VouchError, VouchResult};
use crate::types::{HashAlgorithm, HashSink, PathInfo, StorePath};

const STORE_SUBDIR: &str = "store";
const INFO_SUBDIR: &str = "info";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    store_dir: String,
}

impl LocalStore {
    /// Create the directory layout under `root` and open it
    pub fn init(root: impl AsRef<Path>, store_dir: &str) -> VouchResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(STORE_SUBDIR))?;
        fs::create_dir_all(root.join(INFO_SUBDIR))?;
        Self::open(root, store_dir)
    }

    pub fn open(root: impl AsRef<Path>, store_dir: &str) -> VouchResult<Self> {
        let root = root.as_ref().to_path_buf();
        for subdir in [STORE_SUBDIR, INFO_SUBDIR] {
            if !root.join(subdir).is_dir() {
                return Err(VouchError::Configuration(format!(
                    "{} is not a store: missing {}/",
                    root.display(),
                    subdir
                )));
            }
        }
        Ok(Self {
            root,
            store_dir: store_dir.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> &str {
        &self.store_dir
    }

    /// Where the contents of `path` live on disk
    pub fn physical_path(&self, path: &StorePath) -> PathBuf {
        self.root.join(STORE_SUBDIR).join(path.base_name())
    }

    fn info_file(&self, path: &StorePath) -> PathBuf {
        self.root
            .join(INFO_SUBDIR)
            .join(format!("{}.json", path.hash_part()))
    }

    fn owns(&self, path: &StorePath) -> bool {
        path.store_dir() == self.store_dir
    }

    /// Import the file tree at `source` as a new ultimately trusted path
    pub fn add_path(&self, name: &str, source: &Path) -> VouchResult<PathInfo> {
        let mut sink = HashSink::new(HashAlgorithm::Sha256);
        nar::dump_path(source, &mut sink)?;
        let (nar_hash, nar_size) = sink.finish();

        let path = StorePath::from_digest(&self.store_dir, name, nar_hash.digest())?;
        let target = self.physical_path(&path);
        if fs::symlink_metadata(&target).is_ok() {
            remove_tree(&target)?;
        }
        copy_tree(source, &target)?;

        let mut info = PathInfo::new(path, nar_hash, nar_size);
        info.ultimate = true;
        self.write_path_info(&info)?;

        tracing::debug!(path = %info.path, nar_size, "added path to local store");
        Ok(info)
    }

    /// Record (or replace) the metadata for a path
    pub fn write_path_info(&self, info: &PathInfo) -> VouchResult<()> {
        if !self.owns(&info.path) {
            return Err(VouchError::InvalidStorePath(format!(
                "'{}' is not in {}",
                info.path, self.store_dir
            )));
        }
        let json = serde_json::to_vec_pretty(info)?;
        let file = self.info_file(&info.path);
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &file)?;
        Ok(())
    }

    /// Attach extra signatures to a recorded path
    pub fn add_signatures(
        &self,
        path: &StorePath,
        sigs: impl IntoIterator<Item = String>,
    ) -> VouchResult<()> {
        let mut info = self.query_path_info(path)?;
        info.sigs.extend(sigs);
        self.write_path_info(&info)
    }

    fn read_info_file(&self, file: &Path) -> StoreResult<PathInfo> {
        let bytes = fs::read(file).map_err(|e| StoreError::io(file.display(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Protocol {
            uri: self.uri(),
            message: format!("corrupt metadata {}: {}", file.display(), e),
        })
    }

    /// Paths present under `store/`, keyed by hash part
    fn contents_by_hash(&self) -> StoreResult<HashMap<String, StorePath>> {
        let store = self.root.join(STORE_SUBDIR);
        let entries = fs::read_dir(&store).map_err(|e| StoreError::io(store.display(), e))?;

        let mut map = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(store.display(), e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match StorePath::resolve(&self.store_dir, name) {
                Ok(path) => {
                    map.insert(path.hash_part().to_string(), path);
                }
                Err(e) => tracing::debug!(entry = name, error = %e, "ignoring store entry"),
            }
        }
        Ok(map)
    }
}

impl Store for LocalStore {
    fn uri(&self) -> String {
        format!("local://{}", self.root.display())
    }

    fn is_valid_path(&self, path: &StorePath) -> StoreResult<bool> {
        Ok(self.owns(path) && self.info_file(path).is_file())
    }

    fn query_path_info(&self, path: &StorePath) -> StoreResult<PathInfo> {
        if !self.is_valid_path(path)? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let info = self.read_info_file(&self.info_file(path))?;
        if &info.path != path {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(info)
    }

    fn nar_from_path(&self, path: &StorePath, sink: &mut dyn Write) -> StoreResult<()> {
        if !self.is_valid_path(path)? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let physical = self.physical_path(path);
        nar::dump_path(&physical, sink).map_err(|e| StoreError::io(physical.display(), e))
    }

    /// Every path with a metadata file.
    ///
    /// Metadata that cannot be read does not stop the enumeration: the path
    /// is recovered from its `store/` entry so that it fails on its own when
    /// verified, and skipped with a warning if there is none.
    fn query_all_valid_paths(&self) -> StoreResult<Vec<StorePath>> {
        let info_dir = self.root.join(INFO_SUBDIR);
        let entries = fs::read_dir(&info_dir).map_err(|e| StoreError::io(info_dir.display(), e))?;

        let mut contents: Option<HashMap<String, StorePath>> = None;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(info_dir.display(), e))?;
            let file = entry.path();
            if file.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.read_info_file(&file) {
                Ok(info) => paths.push(info.path),
                Err(e) => {
                    let hash_part = file
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if contents.is_none() {
                        contents = Some(self.contents_by_hash()?);
                    }
                    match contents.as_ref().and_then(|map| map.get(&hash_part)) {
                        Some(path) => {
                            tracing::warn!(path = %path, error = %e, "unreadable path metadata");
                            paths.push(path.clone());
                        }
                        None => {
                            tracing::warn!(file = %file.display(), error = %e, "skipping unreadable metadata");
                        }
                    }
                }
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        let link = fs::read_link(source)?;
        make_symlink(&link, target)
    } else if file_type.is_dir() {
        fs::create_dir(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(source, target)?;
        Ok(())
    }
}

fn remove_tree(target: &Path) -> io::Result<()> {
    if fs::symlink_metadata(target)?.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    }
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot create symlink {}", target.display()),
    ))
}
