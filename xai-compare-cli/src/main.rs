//! xai-compare CLI: compare model explainers on a JSON dataset.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use xai_compare_core::Mode;

/// Compare SHAP, LIME, EBM, Mimic and permutation importance side by side
#[derive(Parser, Debug)]
#[command(name = "xai-compare", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .xai-compare/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fit a reference model on a dataset and compare explainers on its test split
    Compare(CompareArgs),
    /// List the available explainers
    List,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct CompareArgs {
    /// JSON dataset: {"features": [..], "rows": [[..]], "target": [..], "mode": ".."}
    #[arg(short, long)]
    data: PathBuf,

    /// Comma-separated explainer names (configured defaults if omitted)
    #[arg(short, long, value_delimiter = ',')]
    explainers: Vec<String>,

    /// classification or regression (overrides the dataset and config)
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Fraction of rows held out as the test split
    #[arg(long, default_value_t = 0.25)]
    test_size: f64,

    /// Seed for the split and every seeded explainer
    #[arg(long)]
    seed: Option<u64>,

    /// Run explainers on worker threads
    #[arg(long)]
    concurrent: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "xai-compare", "xai-compare")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "xai-compare.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
