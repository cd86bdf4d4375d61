use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateArticleRequest, ListQuery, UpdateArticleRequest},
    services,
};
use crate::{
    auth::{AuthUser, RequestContext},
    error::{AppError, AppResult, ValidationErrors},
    loader::LoadedArticle,
    models::{Article, User},
    policy::{self, Action, Resource},
    state::AppState,
    views::{ArticleEnvelope, ArticlesEnvelope, RejectedArticleEnvelope, ViewAssembler},
};

pub fn article_routes() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route(
            "/articles/:slug",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/:slug/favorite",
            post(favorite_article).delete(unfavorite_article),
        )
}

async fn render(
    state: &AppState,
    viewer: Option<&User>,
    article: &Article,
) -> AppResult<Json<ArticleEnvelope>> {
    let article = ViewAssembler::new(state.store.as_ref(), viewer)
        .article(article)
        .await?;
    Ok(Json(ArticleEnvelope { article }))
}

/// A repeated toggle is still answered with the article, under 422.
async fn toggled(
    state: &AppState,
    user: &User,
    article: &Article,
    outcome: AppResult<()>,
) -> AppResult<Response> {
    match outcome {
        Ok(()) => Ok(render(state, Some(user), article).await?.into_response()),
        Err(AppError::Validation(errors)) => {
            let article = ViewAssembler::new(state.store.as_ref(), Some(user))
                .article(article)
                .await?;
            let body = RejectedArticleEnvelope { article, errors };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response())
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip(state, ctx))]
pub async fn list_articles(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<ArticlesEnvelope>> {
    let Query(query) = query
        .map_err(|e| AppError::Validation(ValidationErrors::single("query", &e.body_text())))?;
    let filter = services::build_filter(query)?;
    let articles = state.store.list_articles(&filter).await?;
    let envelope = ViewAssembler::new(state.store.as_ref(), ctx.identity.user())
        .articles(&articles)
        .await?;
    Ok(Json(envelope))
}

#[instrument(skip(state, user, payload), fields(user = %user.username))]
pub async fn create_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ArticleEnvelope>)> {
    let Json(CreateArticleRequest { article: input }) = payload?;
    let article = services::create_article(state.store.as_ref(), &user, input).await?;
    Ok((StatusCode::CREATED, render(&state, Some(&user), &article).await?))
}

#[instrument(skip(state, ctx, article), fields(slug = %article.slug))]
pub async fn get_article(
    State(state): State<AppState>,
    ctx: RequestContext,
    LoadedArticle(article): LoadedArticle,
) -> AppResult<Json<ArticleEnvelope>> {
    render(&state, ctx.identity.user(), &article).await
}

#[instrument(skip(state, user, article, payload), fields(slug = %article.slug))]
pub async fn update_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedArticle(article): LoadedArticle,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> AppResult<Json<ArticleEnvelope>> {
    // ownership is decided before the body is looked at
    policy::ensure(&user, Resource::Article(&article), Action::Update)?;
    let Json(UpdateArticleRequest { article: changes }) = payload?;
    let saved = services::update_article(state.store.as_ref(), &user, article, changes).await?;
    render(&state, Some(&user), &saved).await
}

#[instrument(skip(state, user, article), fields(slug = %article.slug))]
pub async fn delete_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedArticle(article): LoadedArticle,
) -> AppResult<StatusCode> {
    services::delete_article(state.store.as_ref(), &user, &article).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user, article), fields(slug = %article.slug))]
pub async fn favorite_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedArticle(mut article): LoadedArticle,
) -> AppResult<Response> {
    let outcome = services::favorite(state.store.as_ref(), &user, &mut article).await;
    toggled(&state, &user, &article, outcome).await
}

#[instrument(skip(state, user, article), fields(slug = %article.slug))]
pub async fn unfavorite_article(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedArticle(mut article): LoadedArticle,
) -> AppResult<Response> {
    let outcome = services::unfavorite(state.store.as_ref(), &user, &mut article).await;
    toggled(&state, &user, &article, outcome).await
}
