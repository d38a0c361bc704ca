//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// relmatrix - release build matrix orchestrator
///
/// Builds one product for every declared (OS flavor, architecture) platform
/// in isolated containers, reuses cached image layers and publishes each
/// binary under a platform-qualified name.
#[derive(Parser, Debug)]
#[command(name = "relmatrix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (default: relmatrix.toml in this or a parent directory)
    #[arg(short, long, global = true, env = "RELMATRIX_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every platform of a matrix and publish the artifacts
    Run(RunArgs),

    /// Check a matrix declaration without building anything
    Validate(ValidateArgs),

    /// List the platforms of a matrix with their cache keys
    List(ListArgs),

    /// Manage the layer cache
    Cache(CacheArgs),

    /// Show or create configuration
    Config(ConfigArgs),

    /// Check container engine availability
    Status,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Matrix to build (default: general.default_matrix)
    #[arg(short, long)]
    pub matrix: Option<String>,

    /// Only build these platform ids
    #[arg(short, long = "platform")]
    pub platforms: Vec<String>,

    /// Neither read nor write the layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Report format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Also write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Matrix to validate (default: general.default_matrix)
    #[arg(short, long)]
    pub matrix: Option<String>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Matrix to list (default: general.default_matrix)
    #[arg(short, long)]
    pub matrix: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a starter relmatrix.toml
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached layers
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove cached layers older than N days
    Gc {
        /// Age threshold in days (default: cache.gc_days)
        #[arg(long)]
        days: Option<u32>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove cached layers
    Clear {
        /// Only clear this platform id
        #[arg(short, long)]
        platform: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
