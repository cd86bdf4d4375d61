//! Path parameter to entity resolution.
//!
//! A failed lookup, missing row or datastore error alike, is a 404.
//!
//! The loaded article is cached in request extensions so a comment lookup
//! on the same request reuses it instead of querying again.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tracing::{debug, warn};

use crate::{
    error::AppError,
    models::{Article, Comment},
    state::AppState,
    store::StoreError,
};

/// Any failure while resolving a path entity aborts the request as not found.
fn lookup_failed(e: StoreError) -> AppError {
    warn!(error = %e, "path lookup failed");
    AppError::NotFound(e.to_string())
}

async fn path_param(parts: &mut Parts, state: &AppState, name: &str) -> Result<String, AppError> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .map_err(|e| AppError::NotFound(e.body_text()))?;
    params
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("missing path parameter {name}")))
}

/// Article named by the `:slug` path segment.
#[derive(Debug, Clone)]
pub struct LoadedArticle(pub Article);

#[async_trait]
impl FromRequestParts<AppState> for LoadedArticle {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(loaded) = parts.extensions.get::<LoadedArticle>() {
            return Ok(loaded.clone());
        }
        let slug = path_param(parts, state, "slug").await?;
        let article = state
            .store
            .find_article_by_slug(&slug)
            .await
            .map_err(lookup_failed)?
            .ok_or_else(|| {
                debug!(%slug, "article lookup missed");
                AppError::NotFound(format!("article {slug} not found"))
            })?;
        let loaded = LoadedArticle(article);
        parts.extensions.insert(loaded.clone());
        Ok(loaded)
    }
}

/// Comment named by `:id`, scoped to the article named by `:slug`.
#[derive(Debug, Clone)]
pub struct LoadedComment(pub Comment);

#[async_trait]
impl FromRequestParts<AppState> for LoadedComment {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = path_param(parts, state, "id").await?;
        let not_found = || AppError::NotFound(format!("comment {raw} not found"));
        let id: i64 = raw.parse().map_err(|_| not_found())?;
        let LoadedArticle(article) = LoadedArticle::from_request_parts(parts, state).await?;
        let comment = state
            .store
            .find_comment(article.id, id)
            .await
            .map_err(lookup_failed)?
            .ok_or_else(not_found)?;
        Ok(LoadedComment(comment))
    }
}
