use serde::{Deserialize, Serialize};

use crate::models::User;

/// Request body for registration, `{"user": {...}}`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterUser,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login, `{"user": {...}}`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserView,
}

/// Authenticated user as returned to its owner, token included.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
    pub email: String,
    pub token: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UserEnvelope {
    pub fn new(user: User, token: String) -> Self {
        Self {
            user: UserView {
                username: user.username,
                email: user.email,
                token,
                bio: user.bio,
                image: user.image,
            },
        }
    }
}
