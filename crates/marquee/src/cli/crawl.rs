use anyhow::{Context, Result};
use console::style;
use marquee_core::{
    AppConfig, CrawlJob, CrawlStats, Enricher, H5aiListing, HttpClient, MetadataProvider,
    OmdbClient, Storage, TmdbClient,
};
use url::Url;

use super::CrawlArgs;

/// Stored failures listed after a crawl.
const SHOWN_FAILURES: usize = 10;

pub async fn run(config: &AppConfig, storage: &Storage, args: &CrawlArgs) -> Result<()> {
    let root = args
        .url
        .as_deref()
        .or(config.crawl_url.as_deref())
        .context("no listing URL: pass --url or set MARQUEE_CRAWL_URL")?;
    let root = Url::parse(root).with_context(|| format!("invalid listing URL '{root}'"))?;

    let mut network = config.network();
    if let Some(timeout) = args.timeout {
        network = network.with_request_timeout(timeout);
    }
    network.validate()?;
    let http = HttpClient::new(network)?;

    let listing = H5aiListing::new(http.clone());
    let tmdb = TmdbClient::new(http.clone(), config.tmdb());
    if !tmdb.is_available() {
        eprintln!(
            "{} TMDB_API_KEY is not set; movies will be stored without metadata",
            style("!").yellow()
        );
    }
    let omdb = config.omdb_api_key.as_ref().map(|key| {
        OmdbClient::new(http.clone(), key.clone()).with_base_url(config.omdb_base_url.clone())
    });

    let mut enricher = Enricher::new(storage, &tmdb);
    if let Some(omdb) = &omdb {
        enricher = enricher.with_posters(omdb);
    }

    eprintln!("Crawling {}", style(&root).cyan());
    let job = CrawlJob {
        root,
        max_items: args.max_items,
        force: args.force,
        retry_failed: args.retry_failed,
    };
    let stats = enricher.run_crawl(&listing, &job).await?;

    print_summary(&stats);
    print_failures(storage).await
}

fn print_summary(stats: &CrawlStats) {
    eprintln!();
    eprintln!("{}", style("Crawl complete").green().bold());
    eprintln!("  Scanned:            {}", stats.scanned);
    eprintln!("  New movies:         {}", stats.new_movies);
    eprintln!("  Updated movies:     {}", stats.updated_movies);
    eprintln!("  Metadata fetched:   {}", stats.metadata_fetched);
    eprintln!("  Skipped unchanged:  {}", stats.skipped_unchanged);
    eprintln!("  Skipped scheduled:  {}", stats.skipped_scheduled);
    if stats.retried > 0 {
        eprintln!("  Retried failures:   {}", stats.retried);
    }

    let failed =
        stats.failed_no_media + stats.failed_timeout + stats.failed_error + stats.unparsed;
    if failed > 0 {
        eprintln!(
            "  {} {failed} ({} no media, {} timeout, {} error, {} unparsed)",
            style("Failed:").red(),
            stats.failed_no_media,
            stats.failed_timeout,
            stats.failed_error,
            stats.unparsed
        );
    }
}

async fn print_failures(storage: &Storage) -> Result<()> {
    let failures = storage.failed_parses().await?;
    if failures.is_empty() {
        return Ok(());
    }

    eprintln!();
    eprintln!("Stored failures:");
    for failure in failures.iter().take(SHOWN_FAILURES) {
        eprintln!(
            "  {} {} {}",
            style("✗").red(),
            failure.name,
            style(failure.reason.description()).dim()
        );
    }
    if failures.len() > SHOWN_FAILURES {
        eprintln!(
            "  ... and {} more (use --retry-failed to revisit them)",
            failures.len() - SHOWN_FAILURES
        );
    }
    Ok(())
}
