use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStatus {
    /// No match yet; retried on a later crawl.
    #[default]
    Missing,
    Ok,
    /// The lookup errored; retried after a longer pause.
    Failed,
}

impl MetadataStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetadataStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(Self::Missing),
            "ok" => Ok(Self::Ok),
            "failed" => Ok(Self::Failed),
            _ => Err(crate::Error::InvalidMetadataStatus(s.to_string())),
        }
    }
}

/// A movie discovered on the listing server, keyed by its file URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub file_url: String,
    pub directory_url: Option<String>,
    pub poster_url: Option<String>,
    pub popularity: Option<f64>,
    pub vote_count: Option<i64>,
    pub vote_average: Option<f64>,
    pub tmdb_id: Option<i64>,
    pub fetched: bool,
    pub metadata_status: MetadataStatus,
    pub genres: Vec<String>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub remote_modified_at: Option<DateTime<Utc>>,
    pub next_crawl_at: Option<DateTime<Utc>>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// "Title (Year)", or just the title when the year is unknown.
    pub fn label(&self) -> String {
        self.year
            .map_or_else(|| self.title.clone(), |y| format!("{} ({y})", self.title))
    }

    /// Whether a retry has been scheduled for later than `now`.
    pub fn is_scheduled_after(&self, now: DateTime<Utc>) -> bool {
        self.next_crawl_at.is_some_and(|next| next > now)
    }
}

/// What the crawler knows about a movie before any metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub year: Option<i32>,
    pub file_url: String,
    pub directory_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub character: String,
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Director {
    pub name: String,
    pub profile_url: Option<String>,
}

/// Extended metadata kept alongside a movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MovieDetail {
    pub overview: String,
    pub runtime: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub backdrop_url: Option<String>,
    pub tagline: String,
    pub imdb_id: Option<String>,
    pub original_language: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    #[serde(default)]
    pub production_companies: Vec<String>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    pub director: Option<Director>,
    /// Set once credits were stored, even when the provider had none.
    pub credits_fetched_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MovieDetail {
    pub const fn credits_fetched(&self) -> bool {
        self.credits_fetched_at.is_some()
    }
}

/// Row shape returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub poster_url: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub genres: Vec<String>,
}

impl From<Movie> for MovieSummary {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            title: m.title,
            year: m.year,
            poster_url: m.poster_url,
            vote_average: m.vote_average,
            vote_count: m.vote_count,
            popularity: m.popularity,
            genres: m.genres,
        }
    }
}
