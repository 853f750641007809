//! Provider-neutral metadata types and the traits the sync jobs depend on.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::movie::{CastMember, Director};
use crate::network::ClientError;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("No metadata API key configured")]
    MissingApiKey,
    #[error("No metadata match for {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(#[from] ClientError),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl MetadataError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_timeout())
    }

    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// One candidate from a title search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub tmdb_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub overview: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub popularity: Option<f64>,
    pub vote_count: Option<i64>,
    pub vote_average: Option<f64>,
}

/// Full record for one movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MovieMetadata {
    pub tmdb_id: i64,
    pub title: String,
    pub genres: Vec<String>,
    pub overview: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub runtime: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub tagline: String,
    pub imdb_id: Option<String>,
    pub original_language: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub production_companies: Vec<String>,
    pub popularity: Option<f64>,
    pub vote_count: Option<i64>,
    pub vote_average: Option<f64>,
}

impl From<SearchHit> for MovieMetadata {
    fn from(hit: SearchHit) -> Self {
        Self {
            tmdb_id: hit.tmdb_id,
            title: hit.title,
            overview: hit.overview,
            poster_url: hit.poster_url,
            backdrop_url: hit.backdrop_url,
            popularity: hit.popularity,
            vote_count: hit.vote_count,
            vote_average: hit.vote_average,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Credits {
    pub cast: Vec<CastMember>,
    pub director: Option<Director>,
}

/// A movie database the enrichment jobs can query.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short lowercase identifier, e.g. `"tmdb"`.
    fn name(&self) -> &'static str;

    /// False when the provider has no credentials and will refuse every call.
    fn is_available(&self) -> bool;

    /// Best match for a title, or `MetadataError::NotFound`.
    async fn search_movie(&self, title: &str, year: Option<i32>) -> MetadataResult<SearchHit>;

    async fn movie_details(&self, tmdb_id: i64) -> MetadataResult<MovieMetadata>;

    async fn movie_credits(&self, tmdb_id: i64) -> MetadataResult<Credits>;
}

/// Secondary source consulted only for a poster image.
#[async_trait]
pub trait PosterSource: Send + Sync {
    async fn poster(&self, title: &str, year: Option<i32>) -> MetadataResult<Option<String>>;
}

/// Bonus added to the similarity score when the release year matches.
const YEAR_MATCH_BONUS: f64 = 0.25;

/// Pick the candidate whose title is closest to `title`.
///
/// Earlier candidates win ties, so the provider's own ranking breaks them.
pub fn best_match(title: &str, year: Option<i32>, candidates: Vec<SearchHit>) -> Option<SearchHit> {
    let wanted = title.to_lowercase();
    let mut best: Option<(f64, SearchHit)> = None;

    for hit in candidates {
        let mut score = strsim::normalized_levenshtein(&wanted, &hit.title.to_lowercase());
        if year.is_some() && hit.year == year {
            score += YEAR_MATCH_BONUS;
        }
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, hit));
        }
    }

    best.map(|(_, hit)| hit)
}
