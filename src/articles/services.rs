use tracing::{info, warn};

use super::dto::{ListQuery, NewArticleInput, DEFAULT_LIMIT};
use crate::{
    error::{AppError, AppResult, ValidationErrors, TAKEN_MSG},
    models::{normalize_tag, Article, ArticleChanges, NewArticle, User},
    policy::{self, Action, Resource},
    store::{ArticleFilter, Datastore, StoreError},
};

pub fn build_filter(q: ListQuery) -> AppResult<ArticleFilter> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = q.offset.unwrap_or(0);
    let mut errs = ValidationErrors::new();
    if limit < 0 {
        errs.add("limit", "must be greater than or equal to 0");
    }
    if offset < 0 {
        errs.add("offset", "must be greater than or equal to 0");
    }
    errs.into_result()?;
    Ok(ArticleFilter {
        tag: q.tag.map(|t| normalize_tag(&t)),
        author: q.author,
        favorited_by: q.favorited,
        limit,
        offset,
    })
}

pub async fn create_article(
    store: &dyn Datastore,
    author: &User,
    input: NewArticleInput,
) -> AppResult<Article> {
    let new = NewArticle::build(
        author,
        &input.title,
        &input.description,
        &input.body,
        &input.tag_list,
    )?;
    if store.find_article_by_slug(&new.slug).await?.is_some() {
        return Err(ValidationErrors::single("slug", TAKEN_MSG).into());
    }
    let article = store.create_article(new).await?;
    info!(slug = %article.slug, author = %author.username, "article created");
    Ok(article)
}

pub async fn update_article(
    store: &dyn Datastore,
    actor: &User,
    mut article: Article,
    changes: ArticleChanges,
) -> AppResult<Article> {
    policy::ensure(actor, Resource::Article(&article), Action::Update)?;
    let slug_changed = article.apply(changes)?;
    if slug_changed {
        if let Some(existing) = store.find_article_by_slug(&article.slug).await? {
            if existing.id != article.id {
                return Err(ValidationErrors::single("slug", TAKEN_MSG).into());
            }
        }
    }
    let saved = store.save_article(&article).await?;
    info!(slug = %saved.slug, slug_changed, "article updated");
    Ok(saved)
}

pub async fn delete_article(store: &dyn Datastore, actor: &User, article: &Article) -> AppResult<()> {
    policy::ensure(actor, Resource::Article(article), Action::Delete)?;
    store.delete_article(article.id).await?;
    info!(slug = %article.slug, "article deleted");
    Ok(())
}

/// Favorites `article` for `user`, updating its count in place.
/// Repeating the call is a validation failure, not a no-op.
pub async fn favorite(store: &dyn Datastore, user: &User, article: &mut Article) -> AppResult<()> {
    match store.favorite_article(user.id, article.id).await {
        Ok(count) => {
            article.favorites_count = count;
            Ok(())
        }
        Err(StoreError::Conflict(_)) => {
            warn!(slug = %article.slug, user = %user.username, "already favorited");
            Err(AppError::Validation(ValidationErrors::single(
                "article",
                "is already favorited",
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn unfavorite(store: &dyn Datastore, user: &User, article: &mut Article) -> AppResult<()> {
    match store.unfavorite_article(user.id, article.id).await {
        Ok(count) => {
            article.favorites_count = count;
            Ok(())
        }
        Err(StoreError::Conflict(_)) => {
            warn!(slug = %article.slug, user = %user.username, "not favorited");
            Err(AppError::Validation(ValidationErrors::single(
                "article",
                "is not favorited",
            )))
        }
        Err(e) => Err(e.into()),
    }
}
