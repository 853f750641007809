mod catalog;
mod movies;
mod search;

use axum::{http::StatusCode, middleware, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::hosts::check_host;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Log a storage failure and hide its details from the client.
pub fn internal(e: &marquee_core::Error) -> ApiError {
    tracing::error!("request failed: {e}");
    error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(search::router())
        .merge(movies::router())
        .merge(catalog::router())
}

/// The full application with middleware, ready to serve.
pub fn app(state: AppState) -> Router {
    router()
        .layer(middleware::from_fn_with_state(state.clone(), check_host))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
