//! Response projections relative to the viewing identity.
//!
//! `following` and `favorited` are read from the datastore on every
//! projection and never stored on the entity.

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    error::ValidationErrors,
    models::{Article, Comment, Profile, User},
    store::{Datastore, StoreResult},
};

#[derive(Debug, Serialize)]
pub struct AuthorView {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: AuthorView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub author: AuthorView,
}

#[derive(Debug, Serialize)]
pub struct ArticleEnvelope {
    pub article: ArticleView,
}

/// A refused favorite toggle: the article as it stands, plus why.
#[derive(Debug, Serialize)]
pub struct RejectedArticleEnvelope {
    pub article: ArticleView,
    pub errors: ValidationErrors,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesEnvelope {
    pub articles: Vec<ArticleView>,
    pub articles_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CommentEnvelope {
    pub comment: CommentView,
}

#[derive(Debug, Serialize)]
pub struct CommentsEnvelope {
    pub comments: Vec<CommentView>,
}

pub struct ViewAssembler<'a> {
    store: &'a dyn Datastore,
    viewer: Option<&'a User>,
}

impl<'a> ViewAssembler<'a> {
    /// `viewer` is `None` for anonymous requests.
    pub fn new(store: &'a dyn Datastore, viewer: Option<&'a User>) -> Self {
        Self { store, viewer }
    }

    async fn author(&self, author: &Profile) -> StoreResult<AuthorView> {
        let following = match self.viewer {
            Some(v) => self.store.is_following(v.id, author.id).await?,
            None => false,
        };
        Ok(AuthorView {
            username: author.username.clone(),
            bio: author.bio.clone(),
            image: author.image.clone(),
            following,
        })
    }

    pub async fn article(&self, article: &Article) -> StoreResult<ArticleView> {
        let favorited = match self.viewer {
            Some(v) => self.store.is_favorited(v.id, article.id).await?,
            None => false,
        };
        Ok(ArticleView {
            slug: article.slug.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            body: article.body.clone(),
            tag_list: article.tags.clone(),
            created_at: article.created_at,
            updated_at: article.updated_at,
            favorited,
            favorites_count: article.favorites_count,
            author: self.author(&article.author).await?,
        })
    }

    pub async fn articles(&self, articles: &[Article]) -> StoreResult<ArticlesEnvelope> {
        let mut views = Vec::with_capacity(articles.len());
        for a in articles {
            views.push(self.article(a).await?);
        }
        Ok(ArticlesEnvelope {
            articles_count: views.len(),
            articles: views,
        })
    }

    pub async fn comment(&self, comment: &Comment) -> StoreResult<CommentView> {
        Ok(CommentView {
            id: comment.id,
            body: comment.body.clone(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            author: self.author(&comment.author).await?,
        })
    }

    pub async fn comments(&self, comments: &[Comment]) -> StoreResult<CommentsEnvelope> {
        let mut views = Vec::with_capacity(comments.len());
        for c in comments {
            views.push(self.comment(c).await?);
        }
        Ok(CommentsEnvelope { comments: views })
    }
}
