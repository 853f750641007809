use super::{CreditsSelection, Enricher, JobReport};
use crate::Result;

impl Enricher<'_> {
    /// Fetch top-billed cast and director for the selected movies.
    ///
    /// Without `all`, movies whose credits were fetched before are left out.
    pub async fn fetch_credits(&self, selection: CreditsSelection) -> Result<JobReport> {
        let mut report = JobReport::default();

        let movies = match selection {
            CreditsSelection::Movie(id) => match self.storage.get_movie(id).await {
                Ok(movie) => vec![movie],
                Err(e) if e.is_not_found() => {
                    report.record_failure(id, format!("#{id}"), e);
                    return Ok(report);
                }
                Err(e) => return Err(e),
            },
            CreditsSelection::Candidates { all, limit } => {
                self.storage.credits_candidates(all, limit).await?
            }
        };

        tracing::info!(count = movies.len(), "fetching credits");

        for movie in movies {
            let Some(tmdb_id) = movie.tmdb_id else {
                tracing::warn!(movie = %movie.label(), "no TMDB id, skipping credits");
                report.record_failure(movie.id, movie.label(), "no TMDB id");
                continue;
            };

            match self.provider.movie_credits(tmdb_id).await {
                Ok(credits) => {
                    if let Err(e) = self.storage.save_credits(movie.id, &credits).await {
                        tracing::warn!(movie = %movie.label(), "could not store credits: {e}");
                        report.record_failure(movie.id, movie.label(), e);
                        continue;
                    }
                    tracing::info!(
                        movie = %movie.label(),
                        cast = credits.cast.len(),
                        director = credits.director.as_ref().map(|d| d.name.as_str()),
                        "stored credits"
                    );
                    report.record_success();
                }
                Err(e) => {
                    tracing::warn!(movie = %movie.label(), "credits failed: {e}");
                    report.record_failure(movie.id, movie.label(), e);
                }
            }
        }

        Ok(report)
    }
}
