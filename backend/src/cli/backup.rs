//! Backup CLI commands.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use crate::models::backup::BackupOptions;

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct BackupCli {
    #[command(subcommand)]
    pub command: BackupCommand,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Write a new backup to the backup directory
    Create {
        /// Skip users and their accounts, sessions, wallets and subscriptions
        #[arg(long)]
        no_users: bool,

        /// Skip games and their monetization settings
        #[arg(long)]
        no_games: bool,

        /// Skip reviews and comments
        #[arg(long)]
        no_reviews: bool,

        /// Skip per-game analytics
        #[arg(long)]
        no_analytics: bool,
    },

    /// List backups, newest first
    List,

    /// Restore a backup file, replacing the tables it contains
    Restore {
        /// Path to the backup file
        path: PathBuf,
    },

    /// Delete a backup from the backup directory
    Delete {
        /// Backup file name (not a path)
        file_name: String,
    },
}

impl BackupCommand {
    /// Options for `create`; defaults for every other command.
    pub fn options(&self) -> BackupOptions {
        match self {
            BackupCommand::Create {
                no_users,
                no_games,
                no_reviews,
                no_analytics,
            } => BackupOptions {
                users: !no_users,
                games: !no_games,
                reviews: !no_reviews,
                analytics: !no_analytics,
            },
            _ => BackupOptions::default(),
        }
    }
}

/// Print a result in the selected format.
pub fn output<T: Serialize>(format: OutputFormat, message: &str, value: &T) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: cannot encode output: {}", e),
        },
        OutputFormat::Text => println!("{}", message),
    }
}

/// Print an error in the selected format.
pub fn error(format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": message })),
        OutputFormat::Text => eprintln!("Error: {}", message),
    }
}

/// Print table row
pub fn table_row(cells: &[&str]) {
    println!("{}", cells.join("\t"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_flags_invert_options() {
        let cmd = BackupCommand::Create {
            no_users: false,
            no_games: true,
            no_reviews: false,
            no_analytics: true,
        };
        assert_eq!(
            cmd.options(),
            BackupOptions {
                users: true,
                games: false,
                reviews: true,
                analytics: false,
            }
        );
    }

    #[test]
    fn test_non_create_commands_use_defaults() {
        assert_eq!(BackupCommand::List.options(), BackupOptions::default());
    }
}
