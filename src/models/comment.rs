use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Article, Profile, User};
use crate::error::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub article_id: Uuid,
    pub author: Profile,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Comment {
    pub fn is_authored_by(&self, username: &str) -> bool {
        self.author.username == username
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

impl NewComment {
    pub fn build(article: &Article, author: &User, body: &str) -> Result<Self, ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.require("body", body);
        errs.into_result()?;
        Ok(Self {
            article_id: article.id,
            author_id: author.id,
            body: body.to_string(),
        })
    }
}
