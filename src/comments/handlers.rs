use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::AddCommentRequest;
use crate::{
    auth::{AuthUser, RequestContext},
    error::AppResult,
    loader::{LoadedArticle, LoadedComment},
    models::NewComment,
    policy::{self, Action, Resource},
    state::AppState,
    views::{CommentEnvelope, CommentsEnvelope, ViewAssembler},
};

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/articles/:slug/comments", get(list_comments).post(add_comment))
        .route(
            "/articles/:slug/comments/:id",
            get(get_comment).delete(delete_comment),
        )
}

#[instrument(skip(state, ctx, article), fields(slug = %article.slug))]
pub async fn list_comments(
    State(state): State<AppState>,
    ctx: RequestContext,
    LoadedArticle(article): LoadedArticle,
) -> AppResult<Json<CommentsEnvelope>> {
    let comments = state.store.list_comments(article.id).await?;
    let envelope = ViewAssembler::new(state.store.as_ref(), ctx.identity.user())
        .comments(&comments)
        .await?;
    Ok(Json(envelope))
}

#[instrument(skip(state, ctx, comment), fields(id = comment.id))]
pub async fn get_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    LoadedComment(comment): LoadedComment,
) -> AppResult<Json<CommentEnvelope>> {
    let comment = ViewAssembler::new(state.store.as_ref(), ctx.identity.user())
        .comment(&comment)
        .await?;
    Ok(Json(CommentEnvelope { comment }))
}

#[instrument(skip(state, user, article, payload), fields(slug = %article.slug))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedArticle(article): LoadedArticle,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CommentEnvelope>)> {
    let Json(AddCommentRequest { comment: input }) = payload?;
    let new = NewComment::build(&article, &user, &input.body)?;
    let created = state.store.create_comment(new).await?;
    info!(id = created.id, author = %user.username, "comment created");

    let comment = ViewAssembler::new(state.store.as_ref(), Some(&user))
        .comment(&created)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentEnvelope { comment })))
}

#[instrument(skip(state, user, comment), fields(id = comment.id))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    LoadedComment(comment): LoadedComment,
) -> AppResult<StatusCode> {
    policy::ensure(&user, Resource::Comment(&comment), Action::Delete)?;
    state.store.delete_comment(comment.id).await?;
    info!(id = comment.id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
