//! Batch jobs that keep the library in step with the listing server and the
//! metadata provider.

mod credits;
mod enrich;
mod refresh;
mod report;

use serde::{Deserialize, Serialize};

pub use enrich::{CrawlJob, CrawlStats, Enricher};
pub use report::{missing_report, MissingEntry};

/// Which movies a refresh or credits run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSelection {
    /// Exactly this movie, whatever its state.
    Movie(i64),
    /// The job's default candidates, or every eligible movie when `all`,
    /// capped at `limit`.
    Candidates { all: bool, limit: Option<usize> },
}

impl Default for RefreshSelection {
    fn default() -> Self {
        Self::Candidates {
            all: false,
            limit: None,
        }
    }
}

pub type CreditsSelection = RefreshSelection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub movie_id: i64,
    pub label: String,
    pub error: String,
}

/// Outcome of a batch job. Every processed movie is either a success or a
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<JobFailure>,
}

impl JobReport {
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(
        &mut self,
        movie_id: i64,
        label: impl Into<String>,
        error: impl std::fmt::Display,
    ) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push(JobFailure {
            movie_id,
            label: label.into(),
            error: error.to_string(),
        });
    }

    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by the job tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::metadata::{
        Credits, MetadataError, MetadataProvider, MetadataResult, MovieMetadata, PosterSource,
        SearchHit,
    };
    use crate::network::ClientError;

    #[derive(Default)]
    pub struct FakeProvider {
        pub hits: HashMap<String, SearchHit>,
        pub details: HashMap<i64, MovieMetadata>,
        pub credits: HashMap<i64, Credits>,
        /// Titles whose search fails with a network error.
        pub unreachable: Vec<String>,
        /// Titles whose search fails with a decode error.
        pub broken: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        pub fn with_movie(mut self, title: &str, tmdb_id: i64, rating: f64, genres: &[&str]) -> Self {
            let hit = SearchHit {
                tmdb_id,
                title: title.to_string(),
                year: None,
                overview: String::new(),
                poster_url: Some(format!("https://image.tmdb.org/t/p/w500/{tmdb_id}.jpg")),
                backdrop_url: None,
                popularity: Some(rating * 10.0),
                vote_count: Some(100),
                vote_average: Some(rating),
            };
            let mut details = MovieMetadata::from(hit.clone());
            details.genres = genres.iter().map(|g| (*g).to_string()).collect();
            details.overview = format!("About {title}");
            self.hits.insert(title.to_lowercase(), hit);
            self.details.insert(tmdb_id, details);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl MetadataProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn search_movie(&self, title: &str, _year: Option<i32>) -> MetadataResult<SearchHit> {
            self.log(format!("search:{title}"));
            if self.unreachable.iter().any(|t| t == title) {
                return Err(MetadataError::Network(ClientError::Status {
                    status: 503,
                    url: "fake".into(),
                }));
            }
            if self.broken.iter().any(|t| t == title) {
                return Err(MetadataError::Decode("garbled".into()));
            }
            self.hits
                .get(&title.to_lowercase())
                .cloned()
                .ok_or_else(|| MetadataError::NotFound(title.to_string()))
        }

        async fn movie_details(&self, tmdb_id: i64) -> MetadataResult<MovieMetadata> {
            self.log(format!("details:{tmdb_id}"));
            self.details
                .get(&tmdb_id)
                .cloned()
                .ok_or_else(|| MetadataError::NotFound(tmdb_id.to_string()))
        }

        async fn movie_credits(&self, tmdb_id: i64) -> MetadataResult<Credits> {
            self.log(format!("credits:{tmdb_id}"));
            self.credits
                .get(&tmdb_id)
                .cloned()
                .ok_or_else(|| MetadataError::NotFound(tmdb_id.to_string()))
        }
    }

    pub struct FakePosters(pub Option<String>);

    #[async_trait]
    impl PosterSource for FakePosters {
        async fn poster(&self, _title: &str, _year: Option<i32>) -> MetadataResult<Option<String>> {
            Ok(self.0.clone())
        }
    }
}
