//! Command-line interface for GameSphere.

pub mod backup;
pub mod backup_runner;

use clap::{Parser, Subcommand};

pub use backup::{BackupCli, BackupCommand, OutputFormat};
pub use backup_runner::run as run_backup;

/// GameSphere backend server and operator tooling
#[derive(Parser, Debug)]
#[command(name = "gamesphere-backend", version)]
#[command(about = "GameSphere backend: API server and backup tooling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create, list, restore and delete backups
    Backup(BackupCli),
}
