use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::crawler::{
    CrawlEvent, CrawlOptions, CrawledTitle, Crawler, ListingEntry, ListingSource,
};
use crate::metadata::{
    MetadataError, MetadataProvider, MetadataResult, MovieMetadata, PosterSource,
};
use crate::movie::{MetadataStatus, Movie, NewMovie};
use crate::source::FailureReason;
use crate::storage::Storage;
use crate::Result;

/// Retry delay after an empty lookup or a network failure.
const MISSING_RETRY: Duration = Duration::hours(1);
/// Retry delay after any other lookup failure.
const FAILED_RETRY: Duration = Duration::hours(6);

const PROGRESS_EVERY: usize = 100;

/// Parameters of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub root: Url,
    pub max_items: Option<usize>,
    /// Re-list unchanged directories and re-query already fetched movies.
    pub force: bool,
    /// Visit previously failed directories before the root.
    pub retry_failed: bool,
}

impl CrawlJob {
    pub const fn new(root: Url) -> Self {
        Self {
            root,
            max_items: None,
            force: false,
            retry_failed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub scanned: usize,
    pub new_movies: usize,
    pub updated_movies: usize,
    pub metadata_fetched: usize,
    pub skipped_unchanged: usize,
    pub skipped_scheduled: usize,
    pub failed_no_media: usize,
    pub failed_timeout: usize,
    pub failed_error: usize,
    pub unparsed: usize,
    pub retried: usize,
}

enum Lookup {
    Matched(MovieMetadata),
    PosterOnly(String),
    NoMatch,
}

/// Matches crawled titles against the metadata provider and stores the result.
pub struct Enricher<'a> {
    pub(super) storage: &'a Storage,
    pub(super) provider: &'a dyn MetadataProvider,
    posters: Option<&'a dyn PosterSource>,
}

impl<'a> Enricher<'a> {
    pub fn new(storage: &'a Storage, provider: &'a dyn MetadataProvider) -> Self {
        Self {
            storage,
            provider,
            posters: None,
        }
    }

    #[must_use]
    pub fn with_posters(mut self, posters: &'a dyn PosterSource) -> Self {
        self.posters = Some(posters);
        self
    }

    /// Crawl `job.root` and enrich every title found.
    ///
    /// Per-item problems, storage errors included, are logged and counted in
    /// the returned stats. Only failing to read or write the crawl
    /// bookkeeping before and after the walk aborts the run.
    pub async fn run_crawl(
        &self,
        source: &dyn ListingSource,
        job: &CrawlJob,
    ) -> Result<CrawlStats> {
        let mut stats = CrawlStats::default();
        let mut options = CrawlOptions {
            max_items: job.max_items,
            force: job.force,
            known_dirs: self.storage.known_directories().await?,
            seeds: Vec::new(),
        };

        if job.retry_failed {
            // Empty directories are re-listed anyway; bad file names need a rename.
            let failed = self.storage.failed_parses().await?;
            for failed in failed.into_iter().filter(|f| f.reason.is_retryable()) {
                self.storage.bump_retry_count(&failed.url).await?;
                options.seeds.push(ListingEntry {
                    name: failed.name,
                    url: failed.url,
                    is_dir: true,
                    raw: failed.raw_text,
                });
            }
            stats.retried = options.seeds.len();
            tracing::info!(count = stats.retried, "retrying failed directories");
        }

        let mut crawler = Crawler::new(source, job.root.clone(), options);
        let mut last_progress = 0;

        while let Some(event) = crawler.next().await {
            let url = event.url().to_string();
            if let Err(e) = self.handle_event(event, job.force, &mut stats).await {
                stats.failed_error += 1;
                tracing::warn!(%url, "could not record crawl item: {e}");
            }

            if crawler.scanned() >= last_progress + PROGRESS_EVERY {
                last_progress = crawler.scanned();
                tracing::info!(
                    scanned = last_progress,
                    new = stats.new_movies,
                    skipped = stats.skipped_unchanged,
                    "crawl progress"
                );
            }
        }
        stats.scanned = crawler.scanned();

        self.storage.touch_crawl_source(crawler.root()).await?;
        Ok(stats)
    }

    async fn handle_event(
        &self,
        event: CrawlEvent,
        force: bool,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        match event {
            CrawlEvent::Title(title) => self.enrich_title(&title, force, stats).await?,
            CrawlEvent::Unparsed { name, url } => {
                stats.unparsed += 1;
                tracing::warn!(%name, "no title in file name");
                self.storage
                    .record_failed_parse(
                        &name,
                        &url,
                        FailureReason::ParseError,
                        &name,
                        "no title in file name",
                    )
                    .await?;
            }
            CrawlEvent::DirectoryListed {
                url,
                remote_modified,
                media_count,
            } => {
                self.storage
                    .record_directory(&url, remote_modified, media_count)
                    .await?;
                self.storage.clear_failed_parse(&url).await?;
            }
            CrawlEvent::DirectorySkipped { url } => {
                stats.skipped_unchanged += 1;
                tracing::debug!(%url, "directory unchanged");
            }
            CrawlEvent::DirectoryFailed {
                name,
                url,
                reason,
                raw,
                error,
            } => {
                match reason {
                    FailureReason::NoMedia => stats.failed_no_media += 1,
                    FailureReason::Timeout => stats.failed_timeout += 1,
                    _ => stats.failed_error += 1,
                }
                tracing::warn!(%name, %reason, "directory failed");
                self.storage
                    .record_failed_parse(&name, &url, reason, &raw, &error)
                    .await?;
            }
        }
        Ok(())
    }

    /// Upsert one crawled title and look up its metadata when due.
    pub async fn enrich_title(
        &self,
        title: &CrawledTitle,
        force: bool,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        let (movie, is_new) = self
            .storage
            .upsert_movie(&NewMovie {
                title: title.title.clone(),
                year: title.year,
                file_url: title.file_url.clone(),
                directory_url: title.directory_url.clone(),
            })
            .await?;

        if is_new {
            stats.new_movies += 1;
        }

        if !force {
            if movie.is_scheduled_after(Utc::now()) {
                stats.skipped_scheduled += 1;
                tracing::debug!(movie = %movie.label(), "retry not due yet");
                return Ok(());
            }
            let advanced = match (title.remote_modified, movie.remote_modified_at) {
                (Some(remote), Some(cached)) => remote > cached,
                _ => false,
            };
            if !is_new && movie.fetched && !advanced {
                stats.skipped_unchanged += 1;
                return Ok(());
            }
        }

        let remote = title.remote_modified;
        match self.lookup(&movie).await {
            Ok(found) => {
                match found {
                    Lookup::Matched(meta) => {
                        self.storage.apply_metadata(movie.id, &meta, remote).await?;
                    }
                    Lookup::PosterOnly(poster) => {
                        self.storage.apply_poster(movie.id, &poster, remote).await?;
                    }
                    Lookup::NoMatch => {
                        tracing::warn!(movie = %movie.label(), "no metadata match");
                        self.storage
                            .schedule_retry(movie.id, MetadataStatus::Missing, MISSING_RETRY, remote)
                            .await?;
                        return Ok(());
                    }
                }
                stats.metadata_fetched += 1;
                if !is_new {
                    stats.updated_movies += 1;
                }
                tracing::info!(
                    movie = %movie.label(),
                    provider = self.provider.name(),
                    "fetched metadata"
                );
            }
            Err(e) if e.is_network() => {
                if e.is_timeout() {
                    stats.failed_timeout += 1;
                } else {
                    stats.failed_error += 1;
                }
                tracing::warn!(movie = %movie.label(), "metadata lookup unreachable: {e}");
                self.storage
                    .schedule_retry(movie.id, MetadataStatus::Missing, MISSING_RETRY, None)
                    .await?;
            }
            Err(e) => {
                stats.failed_error += 1;
                tracing::warn!(movie = %movie.label(), "metadata lookup failed: {e}");
                self.storage
                    .schedule_retry(movie.id, MetadataStatus::Failed, FAILED_RETRY, None)
                    .await?;
            }
        }

        Ok(())
    }

    async fn lookup(&self, movie: &Movie) -> MetadataResult<Lookup> {
        if self.provider.is_available() {
            match self.provider.search_movie(&movie.title, movie.year).await {
                Ok(hit) => {
                    let tmdb_id = hit.tmdb_id;
                    let meta = match self.provider.movie_details(tmdb_id).await {
                        Ok(details) => details,
                        Err(e) => {
                            tracing::debug!(tmdb_id, "details unavailable, keeping search result: {e}");
                            MovieMetadata::from(hit)
                        }
                    };
                    return Ok(Lookup::Matched(meta));
                }
                Err(MetadataError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(posters) = self.posters {
            match posters.poster(&movie.title, movie.year).await {
                Ok(Some(url)) => return Ok(Lookup::PosterOnly(url)),
                Ok(None) => {}
                Err(e) => tracing::debug!(movie = %movie.label(), "poster fallback failed: {e}"),
            }
        }

        Ok(Lookup::NoMatch)
    }

    /// Fill in missing detail and credits for one movie on demand.
    ///
    /// Returns whether anything was fetched.
    pub async fn ensure_details(&self, movie: &Movie) -> Result<bool> {
        let Some(tmdb_id) = movie.tmdb_id else {
            return Ok(false);
        };
        if !self.provider.is_available() {
            return Ok(false);
        }

        let detail = self.storage.get_detail(movie.id).await?;
        let mut fetched = false;

        if detail.as_ref().is_none_or(|d| d.overview.is_empty() && d.runtime.is_none()) {
            let meta = self.provider.movie_details(tmdb_id).await?;
            self.storage.save_detail(movie.id, &meta).await?;
            fetched = true;
        }
        if !detail.as_ref().is_some_and(crate::movie::MovieDetail::credits_fetched) {
            let credits = self.provider.movie_credits(tmdb_id).await?;
            self.storage.save_credits(movie.id, &credits).await?;
            fetched = true;
        }

        Ok(fetched)
    }
}
