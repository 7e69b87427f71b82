use clap::{Parser, Subcommand};

/// Watches a clearing house deployment and logs every account change.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Subscribe to the clearing house and log events until Ctrl+C.
    Run(RunCmd),
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to the monitor configuration TOML file.
    /// If not provided, default values will be used.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Optional accounts to track, e.g. `tradeHistoryAccount,depositHistoryAccount`.
    /// Replaces `optional-accounts` from the configuration file when given.
    #[arg(long = "with", value_delimiter = ',')]
    pub optional_accounts: Vec<String>,
}
