use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the auth layer installed in `create_router`, so
/// handlers always receive a verified `AuthUser`. Ownership of the targeted post is
/// checked by the news service, not here. The auth layer also wraps each path's
/// method fallback, so an unsupported method answers 401 to anonymous callers and
/// 405 once a valid token is presented.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/refresh
        .route("/api/refresh", post(handlers::refresh_token))
        // POST /api/news (multipart: title, content, image?)
        .route("/api/news", post(handlers::create_news))
        // PUT/DELETE /api/news/{id}
        // Owner-only; a foreign or missing post answers 403. PUT also answers 400 when
        // title or content is blank.
        .route(
            "/api/news/{id}",
            put(handlers::update_news).delete(handlers::delete_news),
        )
}
