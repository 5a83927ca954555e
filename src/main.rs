//! `shardwatch` command-line front end for the shard directory watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use shardwatch::{DirectoryWatcher, Scanner, Settings, ShardLoader};

#[derive(Parser)]
#[command(name = "shardwatch")]
#[command(version, about = "Keep search index shards in sync with a directory")]
struct Cli {
    /// Settings file (defaults to the nearest .shardwatch/settings.toml)
    #[arg(long, global = true, env = "SHARDWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a shard directory and report every load and unload
    Watch {
        /// Directory containing the shard files
        dir: PathBuf,

        /// Maximum concurrent loads per scan (overrides config)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Show the shard selected for each logical name, without loading
    Scan {
        /// Directory containing the shard files
        dir: PathBuf,
    },

    /// Show current configuration
    Config,
}

/// Loader that reports decisions instead of opening shards.
struct ReportingLoader;

#[async_trait]
impl ShardLoader for ReportingLoader {
    async fn load(&self, path: &Path) {
        println!("load    {}", path.display());
    }

    async fn unload(&self, path: &Path) {
        println!("unload  {}", path.display());
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    settings
        .map_err(|e| anyhow!(e.to_string()))
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    shardwatch::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Watch { dir, concurrency } => {
            let mut config = settings.watcher.clone();
            if let Some(concurrency) = concurrency {
                config.max_concurrent_loads = concurrency;
            }

            let watcher = DirectoryWatcher::with_config(&dir, Arc::new(ReportingLoader), &config)
                .await
                .with_context(|| format!("failed to watch {}", dir.display()))?;

            eprintln!("Watching {} (Ctrl-C to stop)", dir.display());
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;

            watcher.shutdown().await;
        }

        Commands::Scan { dir } => {
            let scanner = Scanner::new(&dir, Arc::new(ReportingLoader), &settings.watcher);
            let shards = scanner
                .selected()
                .with_context(|| format!("failed to scan {}", dir.display()))?;

            if shards.is_empty() {
                eprintln!("No loadable shards in {}", dir.display());
            }
            for shard in shards {
                println!("v{:<4} {}", shard.version, shard.path.display());
            }
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&settings).context("failed to render configuration")?;
            print!("{rendered}");
        }
    }

    Ok(())
}
