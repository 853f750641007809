use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use marquee_core::{Movie, MovieDetail};
use serde::Serialize;

use super::{error, internal, ApiError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/movie/{id}", get(get_movie))
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    #[serde(flatten)]
    pub movie: Movie,
    pub detail: Option<MovieDetail>,
}

async fn get_movie(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MovieResponse>, ApiError> {
    let Path(id) = id.map_err(|e| error(e.status(), e.body_text()))?;
    let movie = match state.storage.get_movie(id).await {
        Ok(movie) => movie,
        Err(e) if e.is_not_found() => {
            return Err(error(StatusCode::NOT_FOUND, format!("movie {id} not found")));
        }
        Err(e) => return Err(internal(&e)),
    };

    // Detail and credits are fetched on first view; a failure still shows the movie.
    if state.provider.is_available() {
        if let Err(e) = state.enricher().ensure_details(&movie).await {
            tracing::warn!(movie = %movie.label(), "could not fetch details: {e}");
        }
    }

    let detail = state
        .storage
        .get_detail(id)
        .await
        .map_err(|e| internal(&e))?;

    Ok(Json(MovieResponse { movie, detail }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use marquee_core::AppConfig;

    use crate::api::testing::{alien_provider, get, library, StaticProvider};

    #[tokio::test]
    async fn test_unknown_movie_is_json_404() {
        let state = library(StaticProvider::default(), AppConfig::default()).await;
        let (status, body) = get(state, "/movie/999").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "movie 999 not found");
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_json_400() {
        let state = library(StaticProvider::default(), AppConfig::default()).await;
        let (status, body) = get(state, "/movie/abc").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn test_detail_fetched_on_first_view() {
        let state = library(alien_provider(), AppConfig::default()).await;
        let (status, body) = get(state.clone(), "/movie/1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Alien");
        assert_eq!(body["genres"][0], "Horror");
        assert_eq!(body["detail"]["runtime"], 117);
        assert_eq!(body["detail"]["cast"][0]["name"], "Sigourney Weaver");

        let stored = state.storage.get_detail(1).await.unwrap().unwrap();
        assert!(stored.credits_fetched());
    }

    #[tokio::test]
    async fn test_fetch_failure_still_returns_movie() {
        // Heat has a TMDB id the provider does not know.
        let state = library(alien_provider(), AppConfig::default()).await;
        let (status, body) = get(state, "/movie/2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Heat");
    }

    #[tokio::test]
    async fn test_unmatched_movie_without_provider() {
        let state = library(StaticProvider::default(), AppConfig::default()).await;
        let (status, body) = get(state, "/movie/3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata_status"], "missing");
        assert!(body["detail"].is_null());
    }
}
