use serde::Deserialize;

use crate::models::ArticleChanges;

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub article: NewArticleInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticleInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub article: ArticleChanges,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
}

pub const DEFAULT_LIMIT: i64 = 20;
