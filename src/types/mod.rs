//! Core value types shared by stores and verifiers

pub mod base32;
pub mod hash;
pub mod path_info;
pub mod store_path;

pub use hash::{Hash, HashAlgorithm, HashSink, Hasher};
pub use path_info::PathInfo;
pub use store_path::StorePath;

/// Default logical location of store paths
pub const DEFAULT_STORE_DIR: &str = "/nix/store";
