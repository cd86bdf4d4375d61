use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{ArticleFilter, Datastore, StoreError, StoreResult};
use crate::models::{Article, Comment, NewArticle, NewComment, NewUser, Profile, User};

/// `Datastore` backed by Postgres through a shared `sqlx` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    bio: Option<String>,
    image: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            bio: r.bio,
            image: r.image,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    body: String,
    favorites_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
    tag_list: Vec<String>,
}

impl From<ArticleRow> for Article {
    fn from(r: ArticleRow) -> Self {
        Self {
            id: r.id,
            slug: r.slug,
            title: r.title,
            description: r.description,
            body: r.body,
            author: Profile {
                id: r.author_id,
                username: r.author_username,
                bio: r.author_bio,
                image: r.author_image,
            },
            tags: r.tag_list,
            favorites_count: r.favorites_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    article_id: Uuid,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            article_id: r.article_id,
            author: Profile {
                id: r.author_id,
                username: r.author_username,
                bio: r.author_bio,
                image: r.author_image,
            },
            body: r.body,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, image, created_at";

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.slug, a.title, a.description, a.body, a.favorites_count,
           a.created_at, a.updated_at,
           u.id AS author_id, u.username AS author_username,
           u.bio AS author_bio, u.image AS author_image,
           ARRAY(
               SELECT t.name
                 FROM article_tags at
                 JOIN tags t ON t.id = at.tag_id
                WHERE at.article_id = a.id
                ORDER BY t.name
           ) AS tag_list
      FROM articles a
      JOIN users u ON u.id = a.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.article_id, c.body, c.created_at, c.updated_at,
           u.id AS author_id, u.username AS author_username,
           u.bio AS author_bio, u.image AS author_image
      FROM comments c
      JOIN users u ON u.id = c.author_id
"#;

/// Maps a unique-key violation to `Conflict(field)`.
fn conflict_on(field: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(field.to_string());
            }
        }
        StoreError::Database(e)
    }
}

impl PgStore {
    async fn article_by_id(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Uuid,
    ) -> StoreResult<Article> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!("{ARTICLE_SELECT} WHERE a.id = $1"))
            .bind(article_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound("article"))?;
        Ok(row.into())
    }

    async fn adjust_favorites(
        tx: &mut Transaction<'_, Postgres>,
        article_id: Uuid,
        delta: i64,
    ) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            UPDATE articles
               SET favorites_count = favorites_count + $2
             WHERE id = $1
         RETURNING favorites_count
            "#,
        )
        .bind(article_id)
        .bind(delta)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound("article"))?;
        Ok(count)
    }
}

#[async_trait]
impl Datastore for PgStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let field = match &e {
                sqlx::Error::Database(db) if db.constraint().is_some_and(|c| c.contains("email")) => {
                    "email"
                }
                _ => "username",
            };
            conflict_on(field)(e)
        })?;
        Ok(row.into())
    }

    async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            r#"
            {ARTICLE_SELECT}
             WHERE ($1::text IS NULL OR EXISTS (
                       SELECT 1
                         FROM article_tags at
                         JOIN tags t ON t.id = at.tag_id
                        WHERE at.article_id = a.id AND t.name = $1))
               AND ($2::text IS NULL OR u.username = $2)
               AND ($3::text IS NULL OR EXISTS (
                       SELECT 1
                         FROM favorites f
                         JOIN users fu ON fu.id = f.user_id
                        WHERE f.article_id = a.id AND fu.username = $3))
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.tag.as_deref())
        .bind(filter.author.as_deref())
        .bind(filter.favorited_by.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!("{ARTICLE_SELECT} WHERE a.slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        let mut tx = self.pool.begin().await?;
        let article_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO articles (id, slug, title, description, body, author_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(article_id)
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.body)
        .bind(article.author_id)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on("slug"))?;

        for name in &article.tags {
            // find-or-create; the no-op update makes RETURNING yield the existing row
            let (tag_id,): (Uuid,) = sqlx::query_as(
                r#"
                INSERT INTO tags (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(article_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        let created = Self::article_by_id(&mut tx, article_id).await?;
        tx.commit().await?;
        debug!(slug = %created.slug, tags = created.tags.len(), "article created");
        Ok(created)
    }

    async fn save_article(&self, article: &Article) -> StoreResult<Article> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE articles
               SET slug = $2, title = $3, description = $4, body = $5, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(article.id)
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.body)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on("slug"))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("article"));
        }
        let saved = Self::article_by_id(&mut tx, article.id).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_article(&self, article_id: Uuid) -> StoreResult<()> {
        // comments, favorites and article_tags go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("article"));
        }
        Ok(())
    }

    async fn favorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO favorites (article_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (article_id, user_id) DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict("article".into()));
        }
        let count = Self::adjust_favorites(&mut tx, article_id, 1).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn unfavorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM favorites WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::Conflict("article".into()));
        }
        let count = Self::adjust_favorites(&mut tx, article_id, -1).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn is_favorited(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE article_id = $1 AND user_id = $2)",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_comments(&self, article_id: Uuid) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.article_id = $1 ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_comment(&self, article_id: Uuid, comment_id: i64) -> StoreResult<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.article_id = $1 AND c.id = $2"
        ))
        .bind(article_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO comments (article_id, author_id, body)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(comment.article_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .fetch_one(&mut *tx)
        .await?;
        let row = sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("comment"));
        }
        Ok(())
    }
}
