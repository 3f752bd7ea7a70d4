use axum::body::Bytes;
use chrono::NaiveDate;
use tracing::instrument;

use crate::{
    error::AppError,
    models::{NewNews, NewsFilter, NewsPost, NewsQuery},
    repository::RepositoryState,
    storage::StorageState,
};

/// An image part received with a new post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// NewsService
///
/// CRUD over news posts. Reads are public; every mutation is scoped to the
/// verified author and reports a foreign or missing post the same way (403).
#[derive(Clone)]
pub struct NewsService {
    repo: RepositoryState,
    storage: StorageState,
}

fn not_found() -> AppError {
    AppError::NotFound("News not found".to_string())
}

fn require_text(title: &str, content: &str) -> Result<(), AppError> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and content are required".to_string(),
        ));
    }
    Ok(())
}

impl NewsFilter {
    /// Turns raw query parameters into a filter. Empty values mean "no filter";
    /// a date must be `YYYY-MM-DD`.
    pub fn parse(query: NewsQuery) -> Result<Self, AppError> {
        let author = query.author.filter(|a| !a.is_empty());
        let date = match query.date.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation("Date must be formatted as YYYY-MM-DD".to_string())
            })?),
        };
        Ok(Self { author, date })
    }
}

impl NewsService {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self { repo, storage }
    }

    /// Every post matching the filter, newest first. No pagination.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: NewsFilter) -> Result<Vec<NewsPost>, AppError> {
        Ok(self.repo.list_news(&filter).await?)
    }

    pub async fn get(&self, id: i64) -> Result<NewsPost, AppError> {
        self.repo.get_news(id).await?.ok_or_else(not_found)
    }

    /// create
    ///
    /// Validates before touching storage, so a rejected post never leaves an orphan image.
    /// An image with no bytes is treated as absent.
    #[instrument(skip(self, content, image), fields(has_image = image.is_some()))]
    pub async fn create(
        &self,
        author_id: i64,
        title: String,
        content: String,
        image: Option<ImageUpload>,
    ) -> Result<i64, AppError> {
        require_text(&title, &content)?;

        let image_url = match image.filter(|img| !img.bytes.is_empty()) {
            Some(img) => Some(self.storage.save_image(&img.file_name, img.bytes).await?),
            None => None,
        };

        let id = self
            .repo
            .create_news(
                author_id,
                NewNews {
                    title,
                    content,
                    image_url,
                },
            )
            .await?;

        tracing::info!(news_id = id, author_id, "news_created");
        Ok(id)
    }

    /// Overwrites title and content of an owned post. `created_at` and `image_url` stay.
    #[instrument(skip(self, title, content))]
    pub async fn update(
        &self,
        author_id: i64,
        id: i64,
        title: &str,
        content: &str,
    ) -> Result<(), AppError> {
        require_text(title, content)?;

        if !self.repo.update_news(id, author_id, title, content).await? {
            return Err(AppError::Forbidden);
        }
        tracing::info!(news_id = id, author_id, "news_updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, author_id: i64, id: i64) -> Result<(), AppError> {
        if !self.repo.delete_news(id, author_id).await? {
            return Err(AppError::Forbidden);
        }
        tracing::info!(news_id = id, author_id, "news_deleted");
        Ok(())
    }
}
