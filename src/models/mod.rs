mod article;
mod comment;
mod user;

pub use article::{normalize_tag, Article, ArticleChanges, NewArticle};
pub use comment::{Comment, NewComment};
pub use user::{NewUser, Profile, User};
