pub mod cli;
pub mod core;
pub mod crypto;
pub mod error;
pub mod store;
pub mod types;
pub mod utils;
pub mod verify;

pub use crate::core::config::Config;
pub use crate::error::{VouchError, VouchResult};
pub use crate::store::{open_store, Store, StoreError};
pub use crate::types::{Hash, PathInfo, StorePath};
pub use crate::verify::{
    CancellationToken, VerificationConfig, Verifier, VerifyOutcome, VerifySummary,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
