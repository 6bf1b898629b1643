mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mnemo::config::{self, MnemoConfig};
use mnemo::{server, watcher};

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Hybrid search over markdown agent memory")]
struct Cli {
    /// Config file (default: <root>/.config/mnemo.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root holding MEMORY.md and memory/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the JSON-RPC server (stdio transport)
    Serve,
    /// Index memory files into the search database
    Index {
        /// Files to index (default: MEMORY.md and memory/**/*.md)
        paths: Vec<PathBuf>,
        /// Delete each file's chunks and re-embed from scratch
        #[arg(long)]
        rebuild: bool,
    },
    /// Search indexed memory
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Drop results scoring below this
        #[arg(long)]
        min_score: Option<f64>,
        /// Skip the embedding provider and rank by keyword relevance
        #[arg(short, long)]
        keyword_only: bool,
        /// Show vector and text scores
        #[arg(short, long)]
        verbose: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch memory files and re-index on change
    Watch,
    /// Show provider, index, and memory file status
    Status,
}

fn load_config(cli: &Cli) -> Result<MnemoConfig> {
    let mut config = match (&cli.config, &cli.root) {
        (Some(path), _) => MnemoConfig::load_from(path)?,
        (None, Some(root)) => MnemoConfig::load_from(config::default_config_path(root))?,
        (None, None) => MnemoConfig::load()?,
    };
    if let Some(root) = &cli.root {
        config.storage.root = root.to_string_lossy().into_owned();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Log to stderr so stdout stays clean for JSON-RPC and command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await?,
        Command::Index { paths, rebuild } => cli::index::index(&config, paths, rebuild).await?,
        Command::Search {
            query,
            limit,
            min_score,
            keyword_only,
            verbose,
            json,
        } => {
            let args = cli::search::SearchArgs {
                limit,
                min_score,
                keyword_only,
                verbose,
                json,
            };
            cli::search::search(&config, &query, args).await?;
        }
        Command::Watch => watcher::run(config).await?,
        Command::Status => cli::status::status(&config).await?,
    }

    Ok(())
}
