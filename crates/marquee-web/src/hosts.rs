use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Reject requests whose Host header is not in `MARQUEE_ALLOWED_HOSTS`.
pub async fn check_host(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default();

    if !state.config.allows_host(host) {
        tracing::warn!(host, "rejected request for disallowed host");
        return (StatusCode::BAD_REQUEST, "Invalid Host header").into_response();
    }

    next.run(req).await
}
