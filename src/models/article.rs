use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Profile, User};
use crate::error::ValidationErrors;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author: Profile,
    pub tags: Vec<String>, // sorted by name
    pub favorites_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new article, slug already derived.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
}

/// Partial update; only these three fields are writable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl NewArticle {
    pub fn build(
        author: &User,
        title: &str,
        description: &str,
        body: &str,
        tags: &[String],
    ) -> Result<Self, ValidationErrors> {
        let slug = slugify(title);
        validate_fields(title, description, body, &slug).into_result()?;
        Ok(Self {
            slug,
            title: title.to_string(),
            description: description.to_string(),
            body: body.to_string(),
            author_id: author.id,
            tags: normalize_tags(tags),
        })
    }
}

impl Article {
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.author.username == username
    }

    /// Merges `changes` into the article and re-validates the result.
    /// Returns whether the slug changed. On error the article is left
    /// untouched.
    pub fn apply(&mut self, changes: ArticleChanges) -> Result<bool, ValidationErrors> {
        let title = changes.title.unwrap_or_else(|| self.title.clone());
        let description = changes.description.unwrap_or_else(|| self.description.clone());
        let body = changes.body.unwrap_or_else(|| self.body.clone());
        let slug = if title != self.title {
            slugify(&title)
        } else {
            self.slug.clone()
        };

        validate_fields(&title, &description, &body, &slug).into_result()?;

        let slug_changed = slug != self.slug;
        self.title = title;
        self.description = description;
        self.body = body;
        self.slug = slug;
        Ok(slug_changed)
    }
}

fn validate_fields(title: &str, description: &str, body: &str, slug: &str) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    errs.require("title", title);
    errs.require("description", description);
    errs.require("body", body);
    if !title.trim().is_empty() && slug.is_empty() {
        errs.add("title", "must contain at least one letter or digit");
    }
    errs
}

/// Lower-cases the title and collapses every run of non-alphanumeric
/// characters into a single `-`.
pub fn slugify(title: &str) -> String {
    lazy_static! {
        static ref SEPARATORS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    }
    let lowered = title.to_lowercase();
    SEPARATORS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trims and lower-cases tag names, drops blanks and duplicates.
pub fn normalize_tags(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = names
        .iter()
        .map(|n| normalize_tag(n))
        .filter(|n| !n.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
