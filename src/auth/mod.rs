use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use extractors::{AuthUser, RequestContext};
pub use jwt::TokenService;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
