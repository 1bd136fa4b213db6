//! Configuration types for vouch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VouchError;
use crate::types::DEFAULT_STORE_DIR;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "VOUCH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyConfig {
    /// Recompute each path's NAR hash
    #[serde(default = "default_check_contents")]
    pub check_contents: bool,
    /// Require each path to be signed by trusted keys
    #[serde(default = "default_check_trust")]
    pub check_trust: bool,
    /// Stores consulted, in order, for additional signatures
    #[serde(default)]
    pub substituters: Vec<String>,
    /// Valid signatures required per path (0 = 1 unless ultimate)
    #[serde(default)]
    pub sigs_needed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrustConfig {
    /// Public keys in `{name}:{base64}` form
    #[serde(default)]
    pub trusted_public_keys: Vec<String>,
    /// Secret key files whose public halves are trusted too
    #[serde(default)]
    pub secret_key_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Store to verify when `--store` is not given
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PerformanceConfig {
    /// Worker threads (0 = all available)
    #[serde(default)]
    pub threads: usize,
}

fn default_check_contents() -> bool { true }
fn default_check_trust() -> bool { true }
fn default_store_dir() -> String { DEFAULT_STORE_DIR.to_string() }

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            check_contents: default_check_contents(),
            check_trust: default_check_trust(),
            substituters: Vec::new(),
            sigs_needed: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            store_dir: default_store_dir(),
        }
    }
}

pub fn default_config() -> Config {
    Config::default()
}

/// Default location of the user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vouch").join("config.toml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, VouchError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| VouchError::Configuration(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

/// Resolve and load the configuration for a run.
///
/// An explicit path must exist; otherwise `VOUCH_CONFIG`, then the per-user
/// file, then built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config, VouchError> {
    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "loading configuration");
        return load_config(path).map_err(|e| match e {
            VouchError::Io(io) => VouchError::Configuration(format!(
                "cannot read config {}: {}",
                path.display(),
                io
            )),
            other => other,
        });
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return resolve_config(Some(Path::new(&path)));
    }

    match default_config_path() {
        Some(path) if path.exists() => resolve_config(Some(&path)),
        _ => Ok(default_config()),
    }
}
