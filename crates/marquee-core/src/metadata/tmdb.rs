use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use super::provider::{
    best_match, Credits, MetadataError, MetadataProvider, MetadataResult, MovieMetadata, SearchHit,
};
use crate::crawler::clean_title_for_search;
use crate::movie::{CastMember, Director};
use crate::network::HttpClient;

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3/";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";

const POSTER_SIZE: &str = "w500";
const BACKDROP_SIZE: &str = "w1280";
const PROFILE_SIZE: &str = "w185";

/// Number of billed cast members kept per movie.
const TOP_CAST: usize = 4;

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: TMDB_API_BASE.to_string(),
            image_base_url: TMDB_IMAGE_BASE.to_string(),
        }
    }
}

pub struct TmdbClient {
    http: HttpClient,
    config: TmdbConfig,
}

impl TmdbClient {
    pub const fn new(http: HttpClient, config: TmdbConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> MetadataResult<Url> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(MetadataError::MissingApiKey)?;

        let mut base = self.config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)
            .and_then(|b| b.join(path))
            .map_err(|e| MetadataError::Decode(format!("bad endpoint {path}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", key);
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn image_url(&self, path: Option<&str>, size: &str) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| format!("{}{size}{p}", self.config.image_base_url))
    }

    fn to_hit(&self, raw: TmdbSearchResult) -> SearchHit {
        SearchHit {
            tmdb_id: raw.id,
            year: year_of(raw.release_date.as_deref()),
            poster_url: self.image_url(raw.poster_path.as_deref(), POSTER_SIZE),
            backdrop_url: self.image_url(raw.backdrop_path.as_deref(), BACKDROP_SIZE),
            title: raw.title.unwrap_or_default(),
            overview: raw.overview.unwrap_or_default(),
            popularity: raw.popularity,
            vote_count: raw.vote_count,
            vote_average: raw.vote_average,
        }
    }

    fn to_metadata(&self, raw: TmdbMovieDetails) -> MovieMetadata {
        MovieMetadata {
            tmdb_id: raw.id,
            title: raw.title.unwrap_or_default(),
            genres: raw.genres.into_iter().map(|g| g.name).collect(),
            overview: raw.overview.unwrap_or_default(),
            poster_url: self.image_url(raw.poster_path.as_deref(), POSTER_SIZE),
            backdrop_url: self.image_url(raw.backdrop_path.as_deref(), BACKDROP_SIZE),
            runtime: raw.runtime.filter(|r| *r > 0),
            release_date: raw
                .release_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            tagline: raw.tagline.unwrap_or_default(),
            imdb_id: raw.imdb_id.filter(|s| !s.is_empty()),
            original_language: raw.original_language.filter(|s| !s.is_empty()),
            budget: raw.budget.filter(|b| *b > 0),
            revenue: raw.revenue.filter(|r| *r > 0),
            production_companies: raw.production_companies.into_iter().map(|c| c.name).collect(),
            popularity: raw.popularity,
            vote_count: raw.vote_count,
            vote_average: raw.vote_average,
        }
    }

    fn to_credits(&self, raw: TmdbCredits) -> Credits {
        let mut cast = raw.cast;
        cast.sort_by_key(|c| c.order.unwrap_or(u32::MAX));

        Credits {
            cast: cast
                .into_iter()
                .take(TOP_CAST)
                .map(|c| CastMember {
                    profile_url: self.image_url(c.profile_path.as_deref(), PROFILE_SIZE),
                    name: c.name,
                    character: c.character.unwrap_or_default(),
                })
                .collect(),
            director: raw
                .crew
                .into_iter()
                .find(|c| c.job.as_deref() == Some("Director"))
                .map(|c| Director {
                    profile_url: self.image_url(c.profile_path.as_deref(), PROFILE_SIZE),
                    name: c.name,
                }),
        }
    }

    fn not_found_for_id(err: MetadataError, tmdb_id: i64) -> MetadataError {
        match err {
            MetadataError::Network(e) if e.is_not_found() => {
                MetadataError::NotFound(format!("tmdb id {tmdb_id}"))
            }
            other => other,
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn search_movie(&self, title: &str, year: Option<i32>) -> MetadataResult<SearchHit> {
        let query = clean_title_for_search(title);
        if query.is_empty() {
            return Err(MetadataError::NotFound(title.to_string()));
        }

        let year_str = year.map(|y| y.to_string());
        let mut params = vec![("query", query.as_str())];
        if let Some(y) = year_str.as_deref() {
            params.push(("year", y));
        }

        let url = self.endpoint("search/movie", &params)?;
        let resp: TmdbSearchResponse = self.http.get_json(&url).await?;
        let hits = resp.results.into_iter().map(|r| self.to_hit(r)).collect();

        best_match(&query, year, hits).ok_or_else(|| MetadataError::NotFound(query))
    }

    async fn movie_details(&self, tmdb_id: i64) -> MetadataResult<MovieMetadata> {
        let url = self.endpoint(&format!("movie/{tmdb_id}"), &[])?;
        let raw: TmdbMovieDetails = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| Self::not_found_for_id(e.into(), tmdb_id))?;
        Ok(self.to_metadata(raw))
    }

    async fn movie_credits(&self, tmdb_id: i64) -> MetadataResult<Credits> {
        let url = self.endpoint(&format!("movie/{tmdb_id}/credits"), &[])?;
        let raw: TmdbCredits = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| Self::not_found_for_id(e.into(), tmdb_id))?;
        Ok(self.to_credits(raw))
    }
}

fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResult {
    id: i64,
    title: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    overview: Option<String>,
    popularity: Option<f64>,
    vote_count: Option<i64>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetails {
    id: i64,
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    runtime: Option<i64>,
    #[serde(default)]
    genres: Vec<TmdbNamed>,
    popularity: Option<f64>,
    vote_count: Option<i64>,
    vote_average: Option<f64>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    tagline: Option<String>,
    imdb_id: Option<String>,
    original_language: Option<String>,
    budget: Option<i64>,
    revenue: Option<i64>,
    #[serde(default)]
    production_companies: Vec<TmdbNamed>,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCast>,
    #[serde(default)]
    crew: Vec<TmdbCrew>,
}

#[derive(Debug, Deserialize)]
struct TmdbCast {
    name: String,
    character: Option<String>,
    profile_path: Option<String>,
    order: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbCrew {
    name: String,
    job: Option<String>,
    profile_path: Option<String>,
}
