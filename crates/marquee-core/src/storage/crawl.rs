use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{parse_opt_timestamp, parse_timestamp, Storage};
use crate::source::{CrawlSource, CrawledDirectory, FailedParse, FailureReason};
use crate::Result;

const MAX_RAW_TEXT: usize = 1000;
const MAX_ERROR_MESSAGE: usize = 500;

type FailedParseRow = (String, String, String, String, String, String, String, i64);

impl Storage {
    pub async fn touch_crawl_source(&self, base_url: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO crawl_sources (base_url, last_crawled_at) VALUES (?, ?)
            ON CONFLICT(base_url) DO UPDATE SET last_crawled_at = excluded.last_crawled_at
            ",
        )
        .bind(base_url)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_crawl_source(&self, base_url: &str) -> Result<Option<CrawlSource>> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT base_url, last_crawled_at FROM crawl_sources WHERE base_url = ?")
                .bind(base_url)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(base_url, last_crawled_at)| {
            Ok(CrawlSource {
                base_url,
                last_crawled_at: parse_opt_timestamp(last_crawled_at)?,
            })
        })
        .transpose()
    }

    // Directory cache

    pub async fn record_directory(
        &self,
        url: &str,
        remote_modified: Option<DateTime<Utc>>,
        movie_count: usize,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO crawled_directories (url, remote_modified_at, last_crawled_at, movie_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                remote_modified_at = excluded.remote_modified_at,
                last_crawled_at = excluded.last_crawled_at,
                movie_count = excluded.movie_count
            ",
        )
        .bind(url)
        .bind(remote_modified.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(i64::try_from(movie_count).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_directory(&self, url: &str) -> Result<Option<CrawledDirectory>> {
        let row: Option<(String, Option<String>, String, i64)> = sqlx::query_as(
            r"
            SELECT url, remote_modified_at, last_crawled_at, movie_count
            FROM crawled_directories WHERE url = ?
            ",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(url, remote_modified_at, last_crawled_at, movie_count)| {
            Ok(CrawledDirectory {
                url,
                remote_modified_at: parse_opt_timestamp(remote_modified_at)?,
                last_crawled_at: parse_timestamp(&last_crawled_at)?,
                movie_count,
            })
        })
        .transpose()
    }

    /// Remote timestamps of every cached directory, keyed by URL.
    pub async fn known_directories(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT url, remote_modified_at FROM crawled_directories")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(url, remote)| Ok((url, parse_opt_timestamp(remote)?)))
            .collect()
    }

    // Failed parses

    /// Record or update a failure for `url`. The retry count is preserved.
    pub async fn record_failed_parse(
        &self,
        name: &str,
        url: &str,
        reason: FailureReason,
        raw_text: &str,
        error_message: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO failed_parses (url, name, reason, raw_text, error_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                reason = excluded.reason,
                raw_text = excluded.raw_text,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            ",
        )
        .bind(url)
        .bind(name)
        .bind(reason.as_str())
        .bind(truncate(raw_text, MAX_RAW_TEXT))
        .bind(truncate(error_message, MAX_ERROR_MESSAGE))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn clear_failed_parse(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM failed_parses WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stored failures, least retried first.
    pub async fn failed_parses(&self) -> Result<Vec<FailedParse>> {
        let rows: Vec<FailedParseRow> = sqlx::query_as(
            r"
            SELECT name, url, reason, raw_text, error_message, created_at, updated_at, retry_count
            FROM failed_parses ORDER BY retry_count, created_at, url
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_failed_row).collect()
    }

    pub async fn bump_retry_count(&self, url: &str) -> Result<()> {
        sqlx::query("UPDATE failed_parses SET retry_count = retry_count + 1 WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}

fn parse_failed_row(row: FailedParseRow) -> Result<FailedParse> {
    let (name, url, reason, raw_text, error_message, created_at, updated_at, retry_count) = row;

    Ok(FailedParse {
        name,
        url,
        reason: reason.parse()?,
        raw_text,
        error_message,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        retry_count,
    })
}
