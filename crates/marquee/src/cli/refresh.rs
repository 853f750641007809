use anyhow::Result;
use console::style;
use marquee_core::{AppConfig, Enricher, HttpClient, JobReport, Storage, TmdbClient};

use super::SelectionArgs;

pub async fn run(config: &AppConfig, storage: &Storage, args: &SelectionArgs) -> Result<()> {
    let http = HttpClient::new(config.network())?;
    let tmdb = TmdbClient::new(http, config.tmdb());

    let report = Enricher::new(storage, &tmdb)
        .refresh(args.selection())
        .await?;

    print_report("Refresh", &report);
    Ok(())
}

/// Shared summary for the per-movie jobs.
pub fn print_report(job: &str, report: &JobReport) {
    for failure in &report.failures {
        eprintln!(
            "  {} {} {}",
            style("✗").red(),
            failure.label,
            style(&failure.error).dim()
        );
    }

    eprintln!();
    eprintln!("{job} complete");
    eprintln!("  Processed: {}", report.processed);
    eprintln!("  Succeeded: {}", report.succeeded);
    eprintln!("  Failed: {}", report.failed);
}
