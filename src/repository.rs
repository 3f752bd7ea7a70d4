use crate::models::{NewNews, NewsFilter, NewsPost, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// StoreError
///
/// Persistence failures. `UniqueViolation` is singled out so registration can report
/// a taken username; everything else is opaque to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Abstract contract for all persistence. Services hold it as `Arc<dyn Repository>`
/// so the Postgres implementation can be swapped for the in-memory one in tests.
///
/// Mutations on news are ownership-scoped: they match on `(id, author_id)` and report
/// whether a row was touched, never whether the row exists.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    // --- News ---
    // Newest first, joined with the author's username.
    async fn list_news(&self, filter: &NewsFilter) -> Result<Vec<NewsPost>, StoreError>;
    async fn get_news(&self, id: i64) -> Result<Option<NewsPost>, StoreError>;
    // Returns the id assigned by the store.
    async fn create_news(&self, author_id: i64, news: NewNews) -> Result<i64, StoreError>;
    async fn update_news(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError>;
    async fn delete_news(&self, id: i64, author_id: i64) -> Result<bool, StoreError>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer.
pub type RepositoryState = Arc<dyn Repository>;

const NEWS_SELECT: &str = r#"
    SELECT
        n.id, n.title, n.content, n.image_url,
        to_char(n.created_at, 'YYYY-MM-DD HH24:MI') AS created_at,
        u.username AS author
    FROM news n
    JOIN users u ON n.user_id = u.id
"#;

/// PostgresRepository
///
/// `Repository` backed by a sqlx connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id, username, password_hash",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// list_news
    ///
    /// Builds the filter clause with `QueryBuilder` so every user-supplied value is bound.
    /// The calendar-day comparison happens in the store's session timezone.
    async fn list_news(&self, filter: &NewsFilter) -> Result<Vec<NewsPost>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(NEWS_SELECT);
        builder.push(" WHERE TRUE");

        if let Some(author) = &filter.author {
            builder.push(" AND u.username = ");
            builder.push_bind(author.clone());
        }

        if let Some(date) = filter.date {
            builder.push(" AND n.created_at::date = ");
            builder.push_bind(date);
        }

        builder.push(" ORDER BY n.created_at DESC, n.id DESC");

        let posts = builder
            .build_query_as::<NewsPost>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsPost>, StoreError> {
        let query = format!("{NEWS_SELECT} WHERE n.id = $1");
        let post = sqlx::query_as::<_, NewsPost>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_news(&self, author_id: i64, news: NewNews) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO news (user_id, title, content, image_url) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(author_id)
        .bind(news.title)
        .bind(news.content)
        .bind(news.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// update_news
    ///
    /// Owner-only: the `user_id` predicate makes a foreign post indistinguishable from a
    /// missing one. `created_at` and `image_url` are left alone.
    async fn update_news(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE news SET title = $1, content = $2 WHERE id = $3 AND user_id = $4",
        )
        .bind(title)
        .bind(content)
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_news(&self, id: i64, author_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM news WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation (For Tests) ---

#[derive(Debug, Clone)]
struct NewsRow {
    id: i64,
    user_id: i64,
    title: String,
    content: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    news: Vec<NewsRow>,
    next_user_id: i64,
    next_news_id: i64,
}

/// InMemoryRepository
///
/// `Repository` over a mutex-guarded vector, mirroring the Postgres semantics
/// (unique usernames, join on author, UTC calendar-day filter, newest first).
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
    should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a database error.
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Inserts a post with an explicit creation time. Used to exercise date filtering.
    pub fn insert_news_at(&self, author_id: i64, news: NewNews, created_at: DateTime<Utc>) -> i64 {
        let mut state = self.lock();
        state.next_news_id += 1;
        let id = state.next_news_id;
        state.news.push(NewsRow {
            id,
            user_id: author_id,
            title: news.title,
            content: news.content,
            image_url: news.image_url,
            created_at,
        });
        id
    }

    /// Stored password hash for a username, for asserting registration side effects.
    pub fn password_hash_of(&self, username: &str) -> Option<String> {
        self.lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.password_hash.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl MemoryState {
    fn to_post(&self, row: &NewsRow) -> Option<NewsPost> {
        let author = self.users.iter().find(|u| u.id == row.user_id)?;
        Some(NewsPost {
            id: row.id,
            title: row.title.clone(),
            content: row.content.clone(),
            image_url: row.image_url.clone(),
            created_at: row.created_at.format("%Y-%m-%d %H:%M").to_string(),
            author: author.username.clone(),
        })
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        self.check()?;
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UniqueViolation);
        }
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_news(&self, filter: &NewsFilter) -> Result<Vec<NewsPost>, StoreError> {
        self.check()?;
        let state = self.lock();
        let mut rows: Vec<&NewsRow> = state
            .news
            .iter()
            .filter(|row| filter.date.is_none_or(|d| row.created_at.date_naive() == d))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .filter_map(|row| state.to_post(row))
            .filter(|post| filter.author.as_ref().is_none_or(|a| &post.author == a))
            .collect())
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsPost>, StoreError> {
        self.check()?;
        let state = self.lock();
        Ok(state
            .news
            .iter()
            .find(|row| row.id == id)
            .and_then(|row| state.to_post(row)))
    }

    async fn create_news(&self, author_id: i64, news: NewNews) -> Result<i64, StoreError> {
        self.check()?;
        Ok(self.insert_news_at(author_id, news, Utc::now()))
    }

    async fn update_news(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.lock();
        match state
            .news
            .iter_mut()
            .find(|row| row.id == id && row.user_id == author_id)
        {
            Some(row) => {
                row.title = title.to_string();
                row.content = content.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_news(&self, id: i64, author_id: i64) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.lock();
        let before = state.news.len();
        state
            .news
            .retain(|row| !(row.id == id && row.user_id == author_id));
        Ok(state.news.len() < before)
    }
}
