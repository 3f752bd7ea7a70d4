use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Nothing here mutates news.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe.
        .route("/health", get(|| async { "ok" }))
        // POST /api/register
        .route("/api/register", post(handlers::register_user))
        // POST /api/login
        // Uniform 401 for unknown users and wrong passwords.
        .route("/api/login", post(handlers::login_user))
        // GET /api/news?author=...&date=YYYY-MM-DD
        .route("/api/news", get(handlers::list_news))
        // GET /api/news/{id}
        .route("/api/news/{id}", get(handlers::get_news))
}
