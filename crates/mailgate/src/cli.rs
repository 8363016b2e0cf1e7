//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mailgate",
    about = "Resolve inbound platform mail into a relay plan and run module migrations",
    version
)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a message and print its relay plan as JSON
    Relay(RelayArgs),
    /// Apply or roll back the module removal migrations
    Migrate {
        #[command(subcommand)]
        command: MigrateCommand,
    },
    /// List registered module handlers
    Handlers,
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Raw message file; reads stdin when omitted
    pub file: Option<PathBuf>,
    /// Envelope recipient; defaults to the To and Cc headers
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,
    /// Include the rendered HTML body in the plan
    #[arg(long)]
    pub print_body: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateCommand {
    /// Run pending removals
    Apply,
    /// Undo applied removals, newest first
    Rollback,
}
