use axum::{extract::State, routing::get, Json, Router};
use marquee_core::CollectionStats;

use super::{internal, ApiError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/genres", get(list_genres))
        .route("/stats", get(stats))
        .route("/health", get(health))
}

async fn list_genres(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let genres = state.storage.list_genres().await.map_err(|e| internal(&e))?;
    Ok(Json(genres))
}

async fn stats(State(state): State<AppState>) -> Result<Json<CollectionStats>, ApiError> {
    let stats = state
        .storage
        .collection_stats()
        .await
        .map_err(|e| internal(&e))?;
    Ok(Json(stats))
}

async fn health() -> &'static str {
    "ok"
}
