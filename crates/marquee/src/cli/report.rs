use anyhow::Result;
use console::style;
use marquee_core::{missing_report, MetadataStatus, Storage};

pub async fn run(storage: &Storage) -> Result<()> {
    let entries = missing_report(storage).await?;

    if entries.is_empty() {
        eprintln!("No missing metadata");
        return Ok(());
    }

    for entry in &entries {
        let year = entry.year.map_or_else(|| "----".to_string(), |y| y.to_string());
        let status = style(format!("{:<8}", entry.status.as_str()));
        let status = match entry.status {
            MetadataStatus::Failed => status.red(),
            _ => status.yellow(),
        };
        let next = entry.next_crawl_at.map_or_else(
            || "-".to_string(),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        );
        println!("{:>6}  {year}  {status} {next:<16}  {}", entry.id, entry.title);
    }

    eprintln!();
    eprintln!("{} movies missing metadata", entries.len());
    Ok(())
}
