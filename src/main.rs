use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use toolshed::cli::commands::aliases::AliasesCommand;
use toolshed::cli::commands::drivers::DriversCommand;
use toolshed::cli::commands::search::SearchCommand;
use toolshed::cli::commands::send::SendCommand;
use toolshed::cli::commands::setup::{SetupCommand, SetupPaths};
use toolshed::cli::commands::{exit_code_for, show_overview};
use toolshed::cli::{Cli, Commands};
use toolshed::config::ToolshedConfig;
use toolshed::fs::StandardFileSystem;
use toolshed::telemetry::{init_telemetry, level_for_verbosity};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    ToolshedConfig::load_env_file()?;
    let config = ToolshedConfig::load(cli.config.as_deref())?;

    let level = level_for_verbosity(&config.observability.log_level, cli.verbose);
    init_telemetry(&level, cli.json_logs || config.observability.json)?;

    // One request per process; a single-threaded runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli.command, &config))
}

async fn execute(command: Option<Commands>, config: &ToolshedConfig) -> Result<()> {
    match command {
        Some(Commands::Send {
            alias,
            subject,
            body,
            body_file,
            driver,
            dry_run,
        }) => {
            SendCommand {
                alias,
                subject,
                body,
                body_file,
                driver,
                dry_run,
            }
            .execute(config)
            .await
        }
        Some(Commands::Aliases { check }) => {
            AliasesCommand::new().with_check(check).execute(config).await
        }
        Some(Commands::Drivers { name }) => DriversCommand::new(name).execute(config).await,
        Some(Commands::Setup {
            from,
            force,
            dry_run,
        }) => {
            let paths = SetupPaths::from_config(config)?;
            SetupCommand::new(paths, force, dry_run, Arc::new(StandardFileSystem))
                .with_from(from)
                .execute(config)
                .await
        }
        Some(Commands::Search {
            query,
            limit,
            language,
            owner,
            min_stars,
            sort,
            include_archived,
            json,
        }) => {
            let mut search = SearchCommand::query_from(query, limit, config);
            search.language = language;
            search.owner = owner;
            search.min_stars = min_stars;
            search.sort = sort;
            search.include_archived |= include_archived;
            SearchCommand::new(search, json).execute().await
        }
        None => show_overview(),
    }
}
