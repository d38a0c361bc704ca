//! relmatrix - release build matrix orchestrator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use relmatrix::cli::args::ConfigAction;
use relmatrix::cli::{commands, Cli, Commands};
use relmatrix::config::{Config, ConfigManager};
use relmatrix::error::{MatrixError, MatrixResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            relmatrix::ui::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn (progress output only), 1 = info, 2+ = debug; RUST_LOG wins
    let level = match verbose {
        0 => "relmatrix=warn",
        1 => "relmatrix=info",
        _ => "relmatrix=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

fn config_manager(cli: &Cli) -> MatrixResult<ConfigManager> {
    if let Some(ref path) = cli.config {
        return Ok(ConfigManager::with_path(path.clone()));
    }

    let cwd =
        std::env::current_dir().map_err(|e| MatrixError::io("getting current directory", e))?;
    Ok(match ConfigManager::find_local_config(&cwd) {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::in_dir(&cwd),
    })
}

fn is_config_init(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config(args) if matches!(args.action, Some(ConfigAction::Init { .. }))
    )
}

async fn run() -> MatrixResult<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        commands::completions(shell);
        return Ok(());
    }

    let manager = config_manager(&cli)?;
    let config = match manager.load().await {
        Ok(config) => config,
        // A broken file must not block `config init --force`
        Err(_) if is_config_init(&cli.command) => Config::default(),
        Err(e) => return Err(e),
    };
    init_logging(cli.verbose, &config);
    debug!("Using config {}", manager.path().display());

    match cli.command {
        Commands::Completions { .. } => Ok(()),
        Commands::Run(args) => commands::run(args, &manager, &config).await,
        Commands::Validate(args) => commands::validate(args, &manager, &config).await,
        Commands::List(args) => commands::list(args, &manager, &config).await,
        Commands::Cache(args) => commands::cache(args, &manager, &config).await,
        Commands::Config(args) => commands::config(args, &manager, &config).await,
        Commands::Status => commands::status(&manager, &config).await,
    }
}
