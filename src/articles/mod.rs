use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
mod services;

pub fn router() -> Router<AppState> {
    handlers::article_routes()
}
