use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Stored Records ---

/// User
///
/// Row of the `users` table. The password hash stays server-side: this type is
/// deliberately not `Serialize`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// NewsPost
///
/// A news row joined with its author's username. `created_at` is rendered by the
/// store as `YYYY-MM-DD HH:MM` in its own timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct NewsPost {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    #[schema(example = "2024-01-01 09:30")]
    pub created_at: String,
    // Username of the post's author (joined from `users`).
    pub author: String,
}

/// NewNews
///
/// Validated input for inserting a news row.
#[derive(Debug, Clone, Default)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
}

/// NewsFilter
///
/// Listing restrictions. Both are exact matches; `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFilter {
    pub author: Option<String>,
    pub date: Option<NaiveDate>,
}

// --- Request Payloads ---

/// NewsQuery
///
/// Raw query parameters of `GET /api/news`, before validation into a `NewsFilter`.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
pub struct NewsQuery {
    /// Exact author username.
    pub author: Option<String>,
    /// Calendar day of creation, `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// Credentials
///
/// Body of both `POST /api/register` and `POST /api/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// UpdateNewsRequest
///
/// Body of `PUT /api/news/{id}`. Both fields replace the stored values.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNewsRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Multipart form accepted by `POST /api/news`. Documentation only; the handler
/// reads the parts directly.
#[derive(ToSchema)]
pub struct CreateNewsForm {
    pub title: String,
    pub content: String,
    #[schema(format = Binary, value_type = Option<String>)]
    pub image: Option<Vec<u8>>,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// CreatedResponse
///
/// Returned after a successful `POST /api/news`, carrying the store-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}
