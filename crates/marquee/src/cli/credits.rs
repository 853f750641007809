use anyhow::Result;
use marquee_core::{AppConfig, Enricher, HttpClient, Storage, TmdbClient};

use super::refresh::print_report;
use super::SelectionArgs;

pub async fn run(config: &AppConfig, storage: &Storage, args: &SelectionArgs) -> Result<()> {
    let http = HttpClient::new(config.network())?;
    let tmdb = TmdbClient::new(http, config.tmdb());

    let report = Enricher::new(storage, &tmdb)
        .fetch_credits(args.selection())
        .await?;

    print_report("Credits", &report);
    Ok(())
}
