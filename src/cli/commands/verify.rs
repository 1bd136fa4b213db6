use clap::Args;
use std::path::PathBuf;

use crate::cli::output;
use crate::cli::progress::ConsoleProgress;
use crate::core::config::{resolve_config, Config};
use crate::crypto::{load_default_public_keys, PublicKeySet};
use crate::error::{VouchError, VouchResult};
use crate::store::{open_store, Store};
use crate::types::StorePath;
use crate::verify::{
    CancellationToken, ProgressSink, SilentProgress, VerificationConfig, Verifier, VerifySummary,
};

/// Flags shared by both verification commands
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Do not verify the contents of each path
    #[arg(long)]
    pub no_contents: bool,

    /// Do not verify whether each path is trusted
    #[arg(long)]
    pub no_trust: bool,

    /// Additional store to consult for signatures (can be repeated)
    #[arg(short = 's', long = "substituter", value_name = "URI")]
    pub substituters: Vec<String>,

    /// Number of valid signatures required for a path to be trusted
    #[arg(short = 'n', long)]
    pub sigs_needed: Option<usize>,

    /// Disable the progress display
    #[arg(long)]
    pub no_progress: bool,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct VerifyPathsArgs {
    /// Store paths to verify (full paths or base names)
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub check: CheckArgs,
}

#[derive(Args, Debug)]
pub struct VerifyStoreArgs {
    #[command(flatten)]
    pub check: CheckArgs,
}

/// Options given before the subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub threads: Option<usize>,
    pub store: Option<String>,
    pub config: Option<PathBuf>,
}

/// Everything a run needs, resolved from configuration and flags
struct Session {
    config: Config,
    store: Box<dyn Store>,
    keys: PublicKeySet,
    verification: VerificationConfig,
}

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(config: &mut Config, check: &CheckArgs, global: &GlobalOptions) {
    if check.no_contents {
        config.verify.check_contents = false;
    }
    if check.no_trust {
        config.verify.check_trust = false;
    }
    config
        .verify
        .substituters
        .extend(check.substituters.iter().cloned());
    if let Some(n) = check.sigs_needed {
        config.verify.sigs_needed = n;
    }
    if let Some(threads) = global.threads {
        config.performance.threads = threads;
    }
    if let Some(store) = &global.store {
        config.store.uri = Some(store.clone());
    }
}

fn prepare(check: &CheckArgs, global: &GlobalOptions) -> VouchResult<Session> {
    let mut config = resolve_config(global.config.as_deref())?;
    apply_overrides(&mut config, check, global);

    let uri = config.store.uri.clone().ok_or_else(|| {
        VouchError::Configuration(
            "no store to verify; pass --store, set VOUCH_STORE or [store] uri".to_string(),
        )
    })?;
    let store = open_store(&uri, &config.store.store_dir)?;

    // Keys are only needed when trust is checked
    let keys = if config.verify.check_trust {
        load_default_public_keys(&config.trust)?
    } else {
        PublicKeySet::new()
    };
    let verification = VerificationConfig::open(&config.verify, &config.store.store_dir)?;

    tracing::debug!(
        store = %store.uri(),
        check_contents = verification.check_contents,
        check_trust = verification.check_trust,
        sigs_needed = verification.sigs_needed,
        substituters = verification.substituters.len(),
        "prepared verification"
    );

    Ok(Session {
        config,
        store,
        keys,
        verification,
    })
}

fn execute<F>(check: &CheckArgs, session: &Session, cancel: CancellationToken, run: F) -> VouchResult<i32>
where
    F: FnOnce(&Verifier<'_>) -> VouchResult<VerifySummary>,
{
    let console;
    let silent = SilentProgress;
    let progress: &dyn ProgressSink = if check.no_progress {
        &silent
    } else {
        console = ConsoleProgress::new();
        &console
    };

    let verifier = Verifier::new(
        session.store.as_ref(),
        &session.keys,
        &session.verification,
        progress,
    )
    .with_threads(session.config.performance.threads)
    .with_cancellation(cancel);

    let summary = run(&verifier)?;

    if check.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(summary.outcome.exit_code())
}

/// Verify explicitly named paths; returns the outcome bitmask
pub fn run_paths(
    args: VerifyPathsArgs,
    global: &GlobalOptions,
    cancel: CancellationToken,
) -> VouchResult<i32> {
    let session = prepare(&args.check, global)?;

    let paths = args
        .paths
        .iter()
        .map(|p| StorePath::resolve(&session.config.store.store_dir, p))
        .collect::<VouchResult<Vec<_>>>()?;

    if !args.check.no_progress && !args.check.json {
        output::info(&format!("verifying {} paths in {}", paths.len(), session.store.uri()));
    }
    execute(&args.check, &session, cancel, |verifier| verifier.verify_paths(&paths))
}

/// Verify every valid path of the store; returns the outcome bitmask
pub fn run_store(
    args: VerifyStoreArgs,
    global: &GlobalOptions,
    cancel: CancellationToken,
) -> VouchResult<i32> {
    let session = prepare(&args.check, global)?;

    if !args.check.no_progress && !args.check.json {
        output::info(&format!("verifying all paths in {}", session.store.uri()));
    }
    execute(&args.check, &session, cancel, |verifier| verifier.verify_store())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let mut config = Config::default();
        config.verify.substituters = vec!["https://configured.example.org".to_string()];
        config.verify.sigs_needed = 1;

        let check = CheckArgs {
            no_contents: true,
            substituters: vec!["https://extra.example.org".to_string()],
            sigs_needed: Some(3),
            ..CheckArgs::default()
        };
        let global = GlobalOptions {
            threads: Some(2),
            store: Some("/srv/store".to_string()),
            config: None,
        };
        apply_overrides(&mut config, &check, &global);

        assert!(!config.verify.check_contents);
        assert!(config.verify.check_trust);
        assert_eq!(
            config.verify.substituters,
            vec![
                "https://configured.example.org".to_string(),
                "https://extra.example.org".to_string()
            ]
        );
        assert_eq!(config.verify.sigs_needed, 3);
        assert_eq!(config.performance.threads, 2);
        assert_eq!(config.store.uri.as_deref(), Some("/srv/store"));
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = Config::default();
        config.verify.sigs_needed = 2;
        apply_overrides(&mut config, &CheckArgs::default(), &GlobalOptions::default());
        assert_eq!(config, {
            let mut expected = Config::default();
            expected.verify.sigs_needed = 2;
            expected
        });
    }
}
