//! The `.narinfo` text format served by binary caches.
//!
//! ```text
//! StorePath: /nix/store/<hash>-hello
//! URL: nar/<file-hash>.nar
//! Compression: none
//! NarHash: sha256:...
//! NarSize: 12345
//! References: <hash>-dep <hash>-lib
//! Deriver: <hash>-hello.drv
//! Sig: cache.example.org-1:<base64>
//! ```

use std::fmt::Write as _;

use super::{StoreError, StoreResult};
use crate::types::{Hash, PathInfo, StorePath};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarInfo {
    pub info: PathInfo,
    /// Location of the (possibly compressed) NAR, relative to the cache root
    pub url: Option<String>,
    pub compression: String,
    pub file_hash: Option<Hash>,
    pub file_size: Option<u64>,
}

impl NarInfo {
    pub fn new(info: PathInfo) -> Self {
        Self {
            info,
            url: None,
            compression: "none".to_string(),
            file_hash: None,
            file_size: None,
        }
    }

    /// Parse narinfo text fetched from `uri`.
    ///
    /// Unknown keys are ignored; `StorePath`, `NarHash` and `NarSize` are
    /// mandatory.
    pub fn parse(text: &str, uri: &str) -> StoreResult<Self> {
        let malformed = |message: String| StoreError::Protocol {
            uri: uri.to_string(),
            message,
        };

        let mut store_path = None;
        let mut nar_hash = None;
        let mut nar_size = None;
        let mut url = None;
        let mut compression = None;
        let mut file_hash = None;
        let mut file_size = None;
        let mut references = Vec::new();
        let mut deriver = None;
        let mut sigs = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| malformed(format!("line {} has no key", lineno + 1)))?;
            let value = value.trim();

            match key {
                "StorePath" => {
                    let path = StorePath::parse(value).map_err(|e| malformed(e.to_string()))?;
                    store_path = Some(path);
                }
                "URL" => url = Some(value.to_string()),
                "Compression" => compression = Some(value.to_string()),
                "FileHash" => {
                    file_hash = Some(Hash::parse(value).map_err(|e| malformed(e.to_string()))?)
                }
                "FileSize" => {
                    file_size = Some(value.parse::<u64>().map_err(|e| {
                        malformed(format!("invalid FileSize '{}': {}", value, e))
                    })?)
                }
                "NarHash" => {
                    nar_hash = Some(Hash::parse(value).map_err(|e| malformed(e.to_string()))?)
                }
                "NarSize" => {
                    nar_size = Some(value.parse::<u64>().map_err(|e| {
                        malformed(format!("invalid NarSize '{}': {}", value, e))
                    })?)
                }
                "References" => {
                    references.extend(value.split_whitespace().map(str::to_string));
                }
                "Deriver" if value != "unknown-deriver" => deriver = Some(value.to_string()),
                "Sig" => sigs.push(value.to_string()),
                _ => {}
            }
        }

        let path = store_path.ok_or_else(|| malformed("missing StorePath".to_string()))?;
        let nar_hash = nar_hash.ok_or_else(|| malformed("missing NarHash".to_string()))?;
        let nar_size = nar_size.ok_or_else(|| malformed("missing NarSize".to_string()))?;

        let store_dir = path.store_dir().to_string();
        let resolve = |base: &str| {
            StorePath::resolve(&store_dir, base).map_err(|e| malformed(e.to_string()))
        };

        let mut info = PathInfo::new(path, nar_hash, nar_size);
        for reference in &references {
            info.references.insert(resolve(reference)?);
        }
        info.deriver = deriver.as_deref().map(resolve).transpose()?;
        info.sigs.extend(sigs);

        Ok(Self {
            info,
            url,
            compression: compression.unwrap_or_else(|| "bzip2".to_string()),
            file_hash,
            file_size,
        })
    }

    pub fn render(&self) -> String {
        let info = &self.info;
        let mut out = String::new();

        let _ = writeln!(out, "StorePath: {}", info.path);
        if let Some(url) = &self.url {
            let _ = writeln!(out, "URL: {}", url);
        }
        let _ = writeln!(out, "Compression: {}", self.compression);
        if let Some(file_hash) = &self.file_hash {
            let _ = writeln!(out, "FileHash: {}", file_hash);
        }
        if let Some(file_size) = self.file_size {
            let _ = writeln!(out, "FileSize: {}", file_size);
        }
        let _ = writeln!(out, "NarHash: {}", info.nar_hash);
        let _ = writeln!(out, "NarSize: {}", info.nar_size);

        let refs: Vec<&str> = info.references.iter().map(StorePath::base_name).collect();
        let _ = writeln!(out, "References: {}", refs.join(" "));

        if let Some(deriver) = &info.deriver {
            let _ = writeln!(out, "Deriver: {}", deriver.base_name());
        }
        for sig in &info.sigs {
            let _ = writeln!(out, "Sig: {}", sig);
        }
        out
    }
}
