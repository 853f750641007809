use super::{Enricher, JobReport, RefreshSelection};
use crate::metadata::{MetadataResult, MovieMetadata};
use crate::movie::Movie;
use crate::Result;

/// Smallest rating movement worth a log line.
const RATING_EPSILON: f64 = 0.01;

impl Enricher<'_> {
    /// Re-query popularity, votes and rating for the selected movies.
    ///
    /// A movie that fails is recorded in the report and the run moves on.
    pub async fn refresh(&self, selection: RefreshSelection) -> Result<JobReport> {
        let mut report = JobReport::default();

        let movies = match selection {
            RefreshSelection::Movie(id) => match self.storage.get_movie(id).await {
                Ok(movie) => vec![movie],
                Err(e) if e.is_not_found() => {
                    tracing::warn!(movie_id = id, "cannot refresh unknown movie");
                    report.record_failure(id, format!("#{id}"), e);
                    return Ok(report);
                }
                Err(e) => return Err(e),
            },
            RefreshSelection::Candidates { all, limit } => {
                self.storage.refresh_candidates(all, limit).await?
            }
        };

        tracing::info!(count = movies.len(), "refreshing metadata");

        for movie in movies {
            match self.current_stats(&movie).await {
                Ok(meta) => match self.storage.update_stats(movie.id, &meta).await {
                    Ok(()) => {
                        log_rating_change(&movie, &meta);
                        report.record_success();
                    }
                    Err(e) => {
                        tracing::warn!(movie = %movie.label(), "could not store stats: {e}");
                        report.record_failure(movie.id, movie.label(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!(movie = %movie.label(), "refresh failed: {e}");
                    report.record_failure(movie.id, movie.label(), e);
                }
            }
        }

        Ok(report)
    }

    async fn current_stats(&self, movie: &Movie) -> MetadataResult<MovieMetadata> {
        match movie.tmdb_id {
            Some(tmdb_id) => self.provider.movie_details(tmdb_id).await,
            None => self
                .provider
                .search_movie(&movie.title, movie.year)
                .await
                .map(MovieMetadata::from),
        }
    }
}

fn log_rating_change(movie: &Movie, meta: &MovieMetadata) {
    if let (Some(old), Some(new)) = (movie.vote_average, meta.vote_average) {
        if (old - new).abs() > RATING_EPSILON {
            tracing::info!(movie = %movie.label(), old, new, "rating changed");
            return;
        }
    }
    tracing::info!(movie = %movie.label(), "refreshed");
}
