pub mod commands;
pub mod output;
pub mod progress;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vouch",
    version,
    about = "Verify the integrity and trust of store paths",
    long_about = "Vouch recomputes the content hash of store paths and checks that each one \
                  carries enough valid signatures from trusted keys, optionally collecting \
                  signatures from substituters. The exit status is a bitmask: 1 = corrupted, \
                  2 = untrusted, 4 = failed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, global = true)]
    pub threads: Option<usize>,

    /// Store to verify (directory, local://, file:// or http(s):// URI)
    #[arg(long, global = true, env = "VOUCH_STORE")]
    pub store: Option<String>,

    /// Configuration file (defaults to $VOUCH_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify the given store paths
    VerifyPaths(commands::verify::VerifyPathsArgs),

    /// Verify every valid path in the store
    VerifyStore(commands::verify::VerifyStoreArgs),
}

impl Cli {
    pub fn global_options(&self) -> commands::verify::GlobalOptions {
        commands::verify::GlobalOptions {
            threads: self.threads,
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}
