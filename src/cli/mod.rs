//! CLI module - Command-line interface for Phantom Sales

use clap::{Parser, Subcommand};

/// Phantom Sales - subscriber sales tracking
/// Serves the sales API and syncs subscribers from Phantom
#[derive(Parser, Debug)]
#[command(name = "phantom-sales")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the web API (default)
    #[command(alias = "daemon")]
    Serve,

    /// Run the subscriber sync once and exit
    Sync,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
