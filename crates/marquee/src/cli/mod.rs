pub mod crawl;
pub mod credits;
pub mod refresh;
pub mod report;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use marquee_core::RefreshSelection;

#[derive(Parser)]
#[command(name = "marquee", about = "Movie library crawler and metadata jobs", version)]
pub struct Cli {
    /// SQLite database file (defaults to MARQUEE_DB or the user data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl the listing server and match new titles
    Crawl(CrawlArgs),
    /// Fetch top cast and director for matched movies
    FetchCredits(SelectionArgs),
    /// Re-query popularity and ratings
    RefreshMetadata(SelectionArgs),
    /// List movies still missing metadata
    ReportMissing,
}

#[derive(Args)]
pub struct CrawlArgs {
    /// Listing root (defaults to MARQUEE_CRAWL_URL)
    #[arg(long)]
    pub url: Option<String>,
    /// Re-list unchanged directories and re-query fetched movies
    #[arg(long)]
    pub force: bool,
    /// Visit previously failed directories first
    #[arg(long)]
    pub retry_failed: bool,
    /// Stop after this many listing entries
    #[arg(long)]
    pub max_items: Option<usize>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u32>,
    /// Log every processed item
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct SelectionArgs {
    /// Every eligible movie instead of the default candidates
    #[arg(long, conflicts_with = "movie_id")]
    pub all: bool,
    /// A single movie by id
    #[arg(long)]
    pub movie_id: Option<i64>,
    /// Process at most this many movies
    #[arg(long)]
    pub limit: Option<usize>,
}

impl SelectionArgs {
    pub const fn selection(&self) -> RefreshSelection {
        match self.movie_id {
            Some(id) => RefreshSelection::Movie(id),
            None => RefreshSelection::Candidates {
                all: self.all,
                limit: self.limit,
            },
        }
    }
}

impl Commands {
    pub const fn verbose(&self) -> bool {
        matches!(self, Self::Crawl(CrawlArgs { verbose: true, .. }))
    }
}
