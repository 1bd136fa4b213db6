use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;
use vouch::cli::commands::verify;
use vouch::cli::{Cli, Commands};
use vouch::{CancellationToken, VouchError};

/// Environment variable holding a tracing filter
const LOG_ENV: &str = "VOUCH_LOG";

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "Interrupted, waiting for running checks to finish...".yellow());
        handler_token.cancel();
    }) {
        tracing::warn!(error = %e, "cannot install Ctrl-C handler");
    }

    match run(cli, cancel) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // 0-7 belong to verification outcomes
            let exit_code = match e.downcast_ref::<VouchError>() {
                Some(err) => err.exit_code(),
                None => 8,
            };
            process::exit(exit_code);
        }
    }
}

fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<i32> {
    let global = cli.global_options();

    let code = match cli.command {
        Commands::VerifyPaths(args) => verify::run_paths(args, &global, cancel)?,
        Commands::VerifyStore(args) => verify::run_store(args, &global, cancel)?,
    };
    Ok(code)
}
