use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dbv",
    about = "dbv: version control for database schema objects",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a JSON session script against a fresh in-memory repository
    Run(RunArgs),
    /// Parse a session script and list its steps without running them
    Check(CheckArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RunArgs {
    pub script: PathBuf,
    /// Stop at the first failing step
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    pub script: PathBuf,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Print a single key
    pub key: Option<String>,
}
