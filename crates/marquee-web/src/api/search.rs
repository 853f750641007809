use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::Query;
use marquee_core::{SearchPage, SearchParams, SearchQuery};
use serde::Serialize;

use super::{internal, ApiError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub page: SearchPage,
    /// Parameters that were ignored because they did not validate.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let (query, warnings) = SearchQuery::from_params(&params);
    for warning in &warnings {
        tracing::warn!("search: {warning}");
    }

    let page = state
        .storage
        .search(&query)
        .await
        .map_err(|e| internal(&e))?;

    Ok(Json(SearchResponse { page, warnings }))
}
