//! In-process `Datastore` for tests. One mutex guards the whole state, so
//! every method is atomic with respect to concurrent callers, and the
//! same unique keys as the Postgres schema are enforced by hand.

use std::collections::{BTreeSet, HashSet};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ArticleFilter, Datastore, StoreError, StoreResult};
use crate::models::{Article, Comment, NewArticle, NewComment, NewUser, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    follows: HashSet<(Uuid, Uuid)>,
    articles: Vec<Article>, // insertion order, oldest first
    tags: BTreeSet<String>,
    favorites: HashSet<(Uuid, Uuid)>, // (article, user)
    comments: Vec<Comment>,
    next_comment_id: i64,
}

impl Inner {
    fn user(&self, id: Uuid) -> StoreResult<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound("user"))
    }

    fn article_mut(&mut self, id: Uuid) -> StoreResult<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound("article"))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of favorite rows for the article.
    pub fn favorite_rows(&self, article_id: Uuid) -> usize {
        self.lock()
            .favorites
            .iter()
            .filter(|(a, _)| *a == article_id)
            .count()
    }

    pub fn tag_count(&self) -> usize {
        self.lock().tags.len()
    }

    /// Makes article and comment lookups fail as if the database were gone.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn reachable(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username".into()));
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email".into()));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            bio: None,
            image: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<()> {
        self.lock().follows.insert((follower_id, followee_id));
        Ok(())
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().follows.contains(&(follower_id, followee_id)))
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>> {
        let inner = self.lock();
        let favoriter = match &filter.favorited_by {
            Some(name) => match inner.users.iter().find(|u| &u.username == name) {
                Some(u) => Some(u.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        Ok(inner
            .articles
            .iter()
            .rev()
            .filter(|a| filter.tag.as_ref().map_or(true, |t| a.tags.contains(t)))
            .filter(|a| filter.author.as_ref().map_or(true, |n| &a.author.username == n))
            .filter(|a| favoriter.map_or(true, |u| inner.favorites.contains(&(a.id, u))))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        self.reachable()?;
        Ok(self.lock().articles.iter().find(|a| a.slug == slug).cloned())
    }

    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        let mut inner = self.lock();
        if inner.articles.iter().any(|a| a.slug == article.slug) {
            return Err(StoreError::Conflict("slug".into()));
        }
        let author = inner.user(article.author_id)?.profile();
        for tag in &article.tags {
            inner.tags.insert(tag.clone());
        }
        let mut tags = article.tags;
        tags.sort();
        tags.dedup();
        let now = OffsetDateTime::now_utc();
        let created = Article {
            id: Uuid::new_v4(),
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            author,
            tags,
            favorites_count: 0,
            created_at: now,
            updated_at: now,
        };
        inner.articles.push(created.clone());
        Ok(created)
    }

    async fn save_article(&self, article: &Article) -> StoreResult<Article> {
        let mut inner = self.lock();
        if inner
            .articles
            .iter()
            .any(|a| a.slug == article.slug && a.id != article.id)
        {
            return Err(StoreError::Conflict("slug".into()));
        }
        let stored = inner.article_mut(article.id)?;
        stored.slug = article.slug.clone();
        stored.title = article.title.clone();
        stored.description = article.description.clone();
        stored.body = article.body.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn delete_article(&self, article_id: Uuid) -> StoreResult<()> {
        let mut inner = self.lock();
        let before = inner.articles.len();
        inner.articles.retain(|a| a.id != article_id);
        if inner.articles.len() == before {
            return Err(StoreError::NotFound("article"));
        }
        inner.comments.retain(|c| c.article_id != article_id);
        inner.favorites.retain(|(a, _)| *a != article_id);
        Ok(())
    }

    async fn favorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64> {
        let mut inner = self.lock();
        inner.article_mut(article_id)?;
        if !inner.favorites.insert((article_id, user_id)) {
            return Err(StoreError::Conflict("article".into()));
        }
        let article = inner.article_mut(article_id)?;
        article.favorites_count += 1;
        Ok(article.favorites_count)
    }

    async fn unfavorite_article(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<i64> {
        let mut inner = self.lock();
        inner.article_mut(article_id)?;
        if !inner.favorites.remove(&(article_id, user_id)) {
            return Err(StoreError::Conflict("article".into()));
        }
        let article = inner.article_mut(article_id)?;
        article.favorites_count -= 1;
        Ok(article.favorites_count)
    }

    async fn is_favorited(&self, user_id: Uuid, article_id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().favorites.contains(&(article_id, user_id)))
    }

    async fn list_comments(&self, article_id: Uuid) -> StoreResult<Vec<Comment>> {
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn find_comment(&self, article_id: Uuid, comment_id: i64) -> StoreResult<Option<Comment>> {
        self.reachable()?;
        Ok(self
            .lock()
            .comments
            .iter()
            .find(|c| c.article_id == article_id && c.id == comment_id)
            .cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut inner = self.lock();
        if !inner.articles.iter().any(|a| a.id == comment.article_id) {
            return Err(StoreError::NotFound("article"));
        }
        let author = inner.user(comment.author_id)?.profile();
        inner.next_comment_id += 1;
        let now = OffsetDateTime::now_utc();
        let created = Comment {
            id: inner.next_comment_id,
            article_id: comment.article_id,
            author,
            body: comment.body,
            created_at: now,
            updated_at: now,
        };
        inner.comments.push(created.clone());
        Ok(created)
    }

    async fn delete_comment(&self, comment_id: i64) -> StoreResult<()> {
        let mut inner = self.lock();
        let before = inner.comments.len();
        inner.comments.retain(|c| c.id != comment_id);
        if inner.comments.len() == before {
            return Err(StoreError::NotFound("comment"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &MemoryStore) -> (User, Article) {
        let user = store
            .create_user(NewUser {
                username: "jake".into(),
                email: "jake@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let article = store
            .create_article(NewArticle {
                slug: "how-to-train".into(),
                title: "How to train".into(),
                description: "d".into(),
                body: "b".into(),
                author_id: user.id,
                tags: vec!["dragons".into(), "training".into()],
            })
            .await
            .unwrap();
        (user, article)
    }

    #[tokio::test]
    async fn favorite_count_tracks_rows() {
        let store = MemoryStore::new();
        let (user, article) = seed(&store).await;

        assert_eq!(store.favorite_article(user.id, article.id).await.unwrap(), 1);
        assert!(matches!(
            store.favorite_article(user.id, article.id).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.favorite_rows(article.id), 1);

        assert_eq!(store.unfavorite_article(user.id, article.id).await.unwrap(), 0);
        assert!(matches!(
            store.unfavorite_article(user.id, article.id).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.favorite_rows(article.id), 0);
        let stored = store.find_article_by_slug("how-to-train").await.unwrap().unwrap();
        assert_eq!(stored.favorites_count, 0);
    }

    #[tokio::test]
    async fn tags_are_found_or_created() {
        let store = MemoryStore::new();
        let (user, _) = seed(&store).await;
        store
            .create_article(NewArticle {
                slug: "second".into(),
                title: "Second".into(),
                description: "d".into(),
                body: "b".into(),
                author_id: user.id,
                tags: vec!["dragons".into()],
            })
            .await
            .unwrap();
        assert_eq!(store.tag_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_users_conflict_on_field() {
        let store = MemoryStore::new();
        seed(&store).await;
        let err = store
            .create_user(NewUser {
                username: "other".into(),
                email: "jake@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(f) if f == "email"));
    }

    #[tokio::test]
    async fn delete_cascades() {
        let store = MemoryStore::new();
        let (user, article) = seed(&store).await;
        store.favorite_article(user.id, article.id).await.unwrap();
        store
            .create_comment(NewComment {
                article_id: article.id,
                author_id: user.id,
                body: "hi".into(),
            })
            .await
            .unwrap();

        store.delete_article(article.id).await.unwrap();
        assert_eq!(store.favorite_rows(article.id), 0);
        assert!(store.list_comments(article.id).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_article(article.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
