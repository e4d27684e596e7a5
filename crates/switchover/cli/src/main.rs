//! Switchover CLI - Supervisor release migration for device fleets
//!
//! Moves devices from one supervisor release to another:
//! - `switch` changes release pins, per device or per device type
//! - `query` checks preconditions and counts candidates without writing

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod config;
mod error;
mod notify;
mod output;

use commands::migrate::{self, Dispatch, MigrateArgs, Mode};
use commands::token;
use config::CliConfig;
use error::{CliError, CliResult};
use output::{print_error, print_info};

/// Switchover CLI application
#[derive(Parser)]
#[command(name = "switchover")]
#[command(about = "Switchover - Supervisor release migration CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SWITCHOVER_CONFIG")]
    config: Option<String>,

    /// Environment name, selects <config dir>/switchover/<env>.toml
    #[arg(short, long, global = true, env = "SWITCHOVER_ENV")]
    env: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Move devices to the target supervisor release
    Switch(MigrateArgs),

    /// Verify and count without writing anything
    Query(MigrateArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(CliError::Usage(message)) => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, message)
            .exit(),
        Err(e) => {
            print_error(&e.to_string());
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> CliResult<bool> {
    let (mode, args) = match cli.command {
        Commands::Switch(args) => (Mode::Switch, args),
        Commands::Query(args) => (Mode::Query, args),
    };

    // Usage problems are reported before any config is touched
    let dispatch = Dispatch::from_args(&args)?;

    // Load config
    let path = CliConfig::resolve_path(cli.config.as_deref(), cli.env.as_deref())?;
    let mut config = CliConfig::load(&path)?;

    if args.refresh_token {
        token::refresh(&mut config, &path).await?;
    }

    if mode == Mode::Query && dispatch != Dispatch::RefreshOnly {
        print_info("Query mode, nothing will be written");
    }

    migrate::execute(mode, dispatch, &config, cli.output).await
}
