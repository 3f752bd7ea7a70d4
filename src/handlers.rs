use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        CreateNewsForm, CreatedResponse, Credentials, MessageResponse, NewsFilter, NewsPost,
        NewsQuery, TokenResponse, UpdateNewsRequest,
    },
    news::ImageUpload,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
};

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates an account. The password is hashed before it reaches the store.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = Credentials,
    responses(
        (status = 200, description = "Registered", body = MessageResponse),
        (status = 400, description = "Missing fields", body = MessageResponse),
        (status = 409, description = "Username taken", body = MessageResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    state
        .auth
        .register(&payload.username, &payload.password)
        .await?;
    Ok(message("Registration successful"))
}

/// login_user
///
/// [Public Route] Exchanges credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(payload) = payload?;
    let token = state
        .auth
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(TokenResponse { token }))
}

/// refresh_token
///
/// [Authenticated Route] Issues a new token for the caller before the current one expires.
#[utoipa::path(
    post,
    path = "/api/refresh",
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse)
    )
)]
pub async fn refresh_token(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.auth.issue_token(id)?;
    Ok(Json(TokenResponse { token }))
}

// --- News Handlers ---

/// list_news
///
/// [Public Route] Lists posts, newest first, optionally by exact author and/or day.
#[utoipa::path(
    get,
    path = "/api/news",
    params(NewsQuery),
    responses(
        (status = 200, description = "Filtered posts", body = [NewsPost]),
        (status = 400, description = "Bad date", body = MessageResponse)
    )
)]
pub async fn list_news(
    State(state): State<AppState>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<Vec<NewsPost>>, AppError> {
    let filter = NewsFilter::parse(query)?;
    Ok(Json(state.news.list(filter).await?))
}

/// get_news
///
/// [Public Route] A single post by id.
#[utoipa::path(
    get,
    path = "/api/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 200, description = "Found", body = NewsPost),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn get_news(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<NewsPost>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.news.get(id).await?))
}

/// create_news
///
/// [Authenticated Route] Accepts `title`, `content` and an optional `image` file part.
/// Unknown parts are ignored.
#[utoipa::path(
    post,
    path = "/api/news",
    request_body(content = CreateNewsForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Created", body = CreatedResponse),
        (status = 400, description = "Missing fields", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse)
    )
)]
pub async fn create_news(
    AuthUser { id: author_id }: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let mut multipart = multipart?;
    let mut title = String::new();
    let mut content = String::new();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = field.text().await?,
            "content" => content = field.text().await?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                image = Some(ImageUpload { file_name, bytes });
            }
            _ => {}
        }
    }

    let id = state.news.create(author_id, title, content, image).await?;
    Ok(Json(CreatedResponse {
        message: "News created".to_string(),
        id,
    }))
}

/// update_news
///
/// [Authenticated Route] Replaces title and content. Blank title or content is a 400.
/// 403 covers both "not yours" and "does not exist".
#[utoipa::path(
    put,
    path = "/api/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    request_body = UpdateNewsRequest,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 400, description = "Title or content missing or blank", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse),
        (status = 403, description = "Forbidden", body = MessageResponse)
    )
)]
pub async fn update_news(
    AuthUser { id: author_id }: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateNewsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id.map_err(|_| AppError::Forbidden)?;
    let Json(payload) = payload?;
    state
        .news
        .update(author_id, id, &payload.title, &payload.content)
        .await?;
    Ok(message("Updated"))
}

/// delete_news
///
/// [Authenticated Route] Removes an owned post. Same fused 403 as update.
#[utoipa::path(
    delete,
    path = "/api/news/{id}",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Forbidden", body = MessageResponse)
    )
)]
pub async fn delete_news(
    AuthUser { id: author_id }: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id.map_err(|_| AppError::Forbidden)?;
    state.news.delete(author_id, id).await?;
    Ok(message("Deleted"))
}
