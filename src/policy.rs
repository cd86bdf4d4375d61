//! Ownership rules for write operations.

use crate::{
    error::AppError,
    models::{Article, Comment, User},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Article(&'a Article),
    Comment(&'a Comment),
}

/// Articles are writable by their owner only; comments by their author
/// only. The owner of an article gets no say over its comments.
pub fn authorize(actor: &User, resource: Resource<'_>, action: Action) -> bool {
    match (resource, action) {
        (Resource::Article(a), Action::Update | Action::Delete) => a.is_owned_by(&actor.username),
        (Resource::Comment(c), Action::Update | Action::Delete) => {
            c.is_authored_by(&actor.username)
        }
    }
}

/// `authorize` surfaced as `Forbidden`.
pub fn ensure(actor: &User, resource: Resource<'_>, action: Action) -> Result<(), AppError> {
    if authorize(actor, resource, action) {
        return Ok(());
    }
    let what = match resource {
        Resource::Article(_) => "article",
        Resource::Comment(_) => "comment",
    };
    let verb = match action {
        Action::Update => "edit",
        Action::Delete => "delete",
    };
    Err(AppError::Forbidden(format!(
        "you don't have the permission to {verb} this {what}"
    )))
}
