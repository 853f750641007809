use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::movie::{MetadataStatus, Movie};
use crate::storage::Storage;
use crate::Result;

/// One line of the missing-metadata report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub status: MetadataStatus,
    pub next_crawl_at: Option<DateTime<Utc>>,
    pub file_url: String,
}

impl From<Movie> for MissingEntry {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            title: m.title,
            year: m.year,
            status: m.metadata_status,
            next_crawl_at: m.next_crawl_at,
            file_url: m.file_url,
        }
    }
}

/// Movies still lacking metadata, ordered by title.
pub async fn missing_report(storage: &Storage) -> Result<Vec<MissingEntry>> {
    let movies = storage.missing_metadata().await?;
    Ok(movies.into_iter().map(MissingEntry::from).collect())
}
