mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use marquee_core::{AppConfig, Storage};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    let default_filter = if config.debug || cli.command.verbose() {
        "marquee=debug,marquee_core=debug"
    } else {
        "marquee=info,marquee_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let storage = open_storage(&config.db_path).await?;

    match cli.command {
        Commands::Crawl(args) => cli::crawl::run(&config, &storage, &args).await,
        Commands::FetchCredits(args) => cli::credits::run(&config, &storage, &args).await,
        Commands::RefreshMetadata(args) => cli::refresh::run(&config, &storage, &args).await,
        Commands::ReportMissing => cli::report::run(&storage).await,
    }
}

async fn open_storage(path: &Path) -> Result<Storage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let storage = Storage::open(&path.to_string_lossy())
        .await
        .with_context(|| format!("cannot open database {}", path.display()))?;
    Ok(storage)
}
