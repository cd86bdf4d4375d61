//! Persistence contract consumed by the request pipeline.
//!
//! Every mutating method is all-or-nothing: implementations wrap
//! multi-row writes in a single transaction so a half-applied change is
//! never observable, and rely on unique keys (slug, tag name, the
//! `(article, user)` favorite pair) rather than explicit locks.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Article, Comment, NewArticle, NewComment, NewUser, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique key rejected the write; carries the offending field name.
    #[error("conflict on {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// AND-combined filters for the article listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited_by: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait Datastore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with `Conflict("username" | "email")` when either is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<()>;
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    /// Newest first.
    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>>;
    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>>;
    /// Inserts the article and finds-or-creates each tag in one transaction.
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article>;
    /// Persists title, slug, description and body; bumps `updated_at`.
    async fn save_article(&self, article: &Article) -> StoreResult<Article>;
    /// Removes the article together with its comments, favorites and tag links.
    async fn delete_article(&self, article_id: Uuid) -> StoreResult<()>;

    /// Creates the favorite row and increments the counter atomically.
    /// A second favorite by the same user fails with `Conflict`.
    /// Returns the new favorites count.
    async fn favorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64>;
    /// Mirror of `favorite_article`; fails with `Conflict` when absent.
    async fn unfavorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64>;
    async fn is_favorited(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<bool>;

    /// Oldest first.
    async fn list_comments(&self, article_id: Uuid) -> StoreResult<Vec<Comment>>;
    async fn find_comment(&self, article_id: Uuid, comment_id: i64) -> StoreResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()>;
}
