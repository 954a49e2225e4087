use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod confirm;
mod sync_cmd;
mod wipe_cmd;

use cli::{Cli, Command};

/// Exit status for a run that finished but left something undone.
pub(crate) const PARTIAL_EXIT: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Sync(args) => sync_cmd::run_sync(&cli.config, args),
        Command::Wipe(args) => wipe_cmd::run_wipe(&cli.config, args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
