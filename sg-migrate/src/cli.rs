use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "sg-migrate")]
#[command(about = "Copy security groups and prefix lists between environments")]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Copy rule sets and referenced address lists into the destination network.
    Sync(SyncArgs),
    /// Revoke every rule of every destination rule set.
    Wipe(WipeArgs),
}

#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Copy only these source rule sets (repeatable).
    #[arg(long = "source-id")]
    pub source_ids: Vec<String>,
    /// Replace the rules of rule sets that already exist in the destination.
    #[arg(short, long)]
    pub update: bool,
    /// Abort on the first reference that cannot be remapped.
    #[arg(long)]
    pub strict: bool,
    /// Plan the changes without applying them.
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct WipeArgs {
    /// Wipe every network, not only the configured destination network.
    #[arg(long)]
    pub all_networks: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
