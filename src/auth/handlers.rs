use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{LoginRequest, RegisterRequest, UserEnvelope},
    extractors::AuthUser,
    password::{hash_password, verify_password},
};
use crate::{
    error::{AppError, AppResult, ValidationErrors, INVALID_MSG, TAKEN_MSG},
    models::{NewUser, User},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(current_user))
        .route("/users/login", post(login))
}

fn envelope(state: &AppState, user: User) -> AppResult<Json<UserEnvelope>> {
    let token = state.tokens.issue(&user.username).map_err(|e| {
        error!(error = %e, "jwt issue failed");
        AppError::Internal(e.to_string())
    })?;
    Ok(Json(UserEnvelope::new(user, token)))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<UserEnvelope>> {
    let Json(RegisterRequest { user: input }) = payload?;
    let username = input.username.trim().to_string();
    let email = input.email.trim().to_lowercase();

    let mut errs = NewUser::validate(&username, &email, &input.password);
    if !username.is_empty() && state.store.find_user_by_username(&username).await?.is_some() {
        errs.add("username", TAKEN_MSG);
    }
    if errs.get("email").is_none() && state.store.find_user_by_email(&email).await?.is_some() {
        errs.add("email", TAKEN_MSG);
    }
    if !errs.is_empty() {
        warn!(?errs, "registration rejected");
        return Err(errs.into());
    }

    let password_hash = hash_password(&input.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let user = state
        .store
        .create_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    envelope(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<UserEnvelope>> {
    let Json(LoginRequest { user: input }) = payload?;
    let email = input.email.trim().to_lowercase();
    let rejected = || AppError::Validation(ValidationErrors::single("email or password", INVALID_MSG));

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(rejected());
    };

    let ok = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(rejected());
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    envelope(&state, user)
}

#[instrument(skip(state, user))]
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UserEnvelope>> {
    envelope(&state, user)
}
