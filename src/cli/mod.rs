use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::external::SortKey;

pub mod commands;

#[derive(Parser)]
#[command(name = "toolshed")]
#[command(version)]
#[command(about = "Small personal utilities: whitelist-based email sender and GitHub repository search")]
#[command(long_about = "toolshed sends plain-text email only to addresses listed in a whitelist, \
                       resolving short aliases to canonical addresses and handing the message to a \
                       pluggable transport driver. It also wraps `gh search repos`.")]
pub struct Cli {
    /// Configuration file layered over the defaults and user config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit JSON log lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a plain-text email to a whitelisted alias
    Send {
        /// Recipient alias (or canonical address) from the whitelist
        alias: String,
        /// Subject line
        #[arg(short, long)]
        subject: String,
        /// Message body text
        #[arg(short, long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the body from a file ("-" for stdin); stdin is used when no body is given
        #[arg(short = 'f', long, value_name = "PATH")]
        body_file: Option<PathBuf>,
        /// Transport driver (defaults to mail.driver)
        #[arg(short, long)]
        driver: Option<String>,
        /// Resolve, format and initialize the driver, then print the message instead of sending it
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// List whitelist aliases
    Aliases {
        /// Fail when an alias appears on more than one line
        #[arg(long)]
        check: bool,
    },
    /// List transport drivers, or show setup help for one
    Drivers {
        /// Driver to describe
        name: Option<String>,
    },
    /// Write configuration, whitelist and credentials templates
    Setup {
        /// Sender address to record in the configuration
        #[arg(long, value_name = "EMAIL")]
        from: Option<String>,
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
        /// Show what would be created without making changes
        #[arg(long)]
        dry_run: bool,
    },
    /// Search GitHub repositories through the gh CLI
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,
        /// Maximum number of results (defaults to search.limit)
        #[arg(short = 'L', long)]
        limit: Option<u32>,
        /// Restrict to a primary language
        #[arg(short, long)]
        language: Option<String>,
        /// Restrict to repositories owned by this user or organization
        #[arg(long)]
        owner: Option<String>,
        /// Minimum star count
        #[arg(long)]
        min_stars: Option<u32>,
        /// Result ordering
        #[arg(long, value_enum, default_value_t = SortKey::Stars)]
        sort: SortKey,
        /// Keep archived repositories
        #[arg(long)]
        include_archived: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_arguments() {
        let cli = Cli::try_parse_from([
            "toolshed", "send", "self", "-s", "Hi", "-b", "Hello", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Send {
                alias,
                subject,
                body,
                dry_run,
                driver,
                ..
            }) => {
                assert_eq!(alias, "self");
                assert_eq!(subject, "Hi");
                assert_eq!(body.as_deref(), Some("Hello"));
                assert!(dry_run);
                assert_eq!(driver, None);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_body_and_body_file_conflict() {
        assert!(Cli::try_parse_from([
            "toolshed", "send", "self", "-s", "Hi", "-b", "x", "-f", "body.txt",
        ])
        .is_err());
    }

    #[test]
    fn test_send_requires_subject() {
        assert!(Cli::try_parse_from(["toolshed", "send", "self"]).is_err());
    }
}
