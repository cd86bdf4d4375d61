use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ValidationErrors, INVALID_MSG};

/// Registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, never rendered
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
        }
    }
}

/// Public slice of a user embedded as the author of articles and comments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    /// Shape checks on registration input. Uniqueness needs the datastore
    /// and is checked by the caller.
    pub fn validate(username: &str, email: &str, password: &str) -> ValidationErrors {
        let mut errs = ValidationErrors::new();
        errs.require("username", username);
        errs.require("email", email);
        errs.require("password", password);
        if !email.trim().is_empty() && !is_valid_email(email) {
            errs.add("email", INVALID_MSG);
        }
        errs
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
