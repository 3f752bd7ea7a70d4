use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{HeaderName, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod news;
pub mod repository;
pub mod storage;

// Routing split by access level (public, authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthService, TokenKeys};
pub use config::AppConfig;
pub use error::AppError;
pub use news::NewsService;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document for every handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::refresh_token,
        handlers::list_news, handlers::get_news, handlers::create_news,
        handlers::update_news, handlers::delete_news
    ),
    components(
        schemas(
            models::NewsPost, models::Credentials, models::UpdateNewsRequest,
            models::CreateNewsForm, models::MessageResponse, models::TokenResponse,
            models::CreatedResponse,
        )
    ),
    tags(
        (name = "news-portal", description = "News publishing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services and configuration.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub news: NewsService,
    pub config: AppConfig,
}

impl AppState {
    /// Wires both services from a store handle, an image store and the configuration.
    pub fn new(config: AppConfig, repo: RepositoryState, storage: StorageState) -> Self {
        Self {
            auth: AuthService::new(repo.clone(), TokenKeys::from(&config)),
            news: NewsService::new(repo, storage),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> AuthService {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for NewsService {
    fn from_ref(app_state: &AppState) -> NewsService {
        app_state.news.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. The `AuthUser` extractor rejects with a 401 `{message}`
/// before the handler runs; on success the identity is stashed in the request
/// extensions so the handler's own extractor does not verify the token twice.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles routes, the auth layer, static file serving and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let x_request_id = HeaderName::from_static("x-request-id");

    let uploads = ServeDir::new(&state.config.upload_dir);
    let public_files = ServeDir::new(&state.config.public_dir);
    let body_limit = state.config.max_upload_bytes;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Uploaded images, addressed by the path recorded in `image_url`.
        .nest_service(storage::UPLOADS_PREFIX, uploads)
        // Browser client.
        .fallback_service(public_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Request span carrying method, uri and the `x-request-id` so all log lines of one
/// request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
