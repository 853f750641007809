use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::provider::{MetadataError, MetadataResult, PosterSource};
use crate::crawler::clean_title_for_search;
use crate::network::HttpClient;

pub const OMDB_API_BASE: &str = "https://www.omdbapi.com/";

/// OMDb lookup by exact title, used only for its poster.
pub struct OmdbClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl OmdbClient {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: OMDB_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, title: &str, year: Option<i32>) -> MetadataResult<Url> {
        if self.api_key.is_empty() {
            return Err(MetadataError::MissingApiKey);
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MetadataError::Decode(format!("bad OMDb base URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apikey", &self.api_key);
            query.append_pair("t", title);
            if let Some(y) = year {
                query.append_pair("y", &y.to_string());
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct OmdbTitle {
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

#[async_trait]
impl PosterSource for OmdbClient {
    async fn poster(&self, title: &str, year: Option<i32>) -> MetadataResult<Option<String>> {
        let query = clean_title_for_search(title);
        if query.is_empty() {
            return Ok(None);
        }
        let url = self.endpoint(&query, year)?;
        let resp: OmdbTitle = self.http.get_json(&url).await?;
        Ok(usable_poster(resp.poster))
    }
}

/// "N/A" is OMDb's placeholder for no poster.
fn usable_poster(poster: Option<String>) -> Option<String> {
    poster.filter(|p| !p.is_empty() && p != "N/A")
}
