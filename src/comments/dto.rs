use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub comment: CommentInput,
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub body: String,
}
