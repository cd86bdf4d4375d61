//! Two-stage authentication.
//!
//! `resolve_identity` runs on every request: it turns an optional
//! `Authorization: Token <jwt>` header into a `RequestContext`. It never
//! blocks anonymous callers, but a credential that is present and bad
//! (malformed, expired, or naming a user that no longer exists) aborts
//! with 401. `AuthUser` is the mandatory gate, a pure check over the
//! resolved identity.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::claims::Claims;
use crate::{error::AppError, models::User, state::AppState};

const SCHEME: &str = "Token ";

#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(u) => Some(u),
        }
    }

    pub fn require(&self) -> Result<&User, AppError> {
        self.user()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}

/// Per-request auth state, stored in request extensions by `resolve_identity`.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Identity,
    pub claims: Option<Claims>,
}

impl RequestContext {
    /// True once a verified token has been matched to a live user.
    pub fn is_claimed(&self) -> bool {
        self.claims.is_some() && self.identity.user().is_some()
    }
}

fn credential(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed Authorization header".into()))?;
    let token = value
        .strip_prefix(SCHEME)
        .ok_or_else(|| AppError::Unauthorized("invalid auth scheme".into()))?;
    Ok(Some(token.trim().to_string()))
}

pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = match credential(request.headers())? {
        None => RequestContext::default(),
        Some(token) => {
            let claims = state.tokens.verify(&token).map_err(|e| {
                warn!(error = %e, "rejecting token");
                AppError::Unauthorized("invalid or expired token".into())
            })?;
            let user = state
                .store
                .find_user_by_username(&claims.sub)
                .await?
                .ok_or_else(|| {
                    warn!(username = %claims.sub, "token for unknown user");
                    AppError::Unauthorized(format!("user {} does not exist", claims.sub))
                })?;
            RequestContext {
                identity: Identity::Authenticated(user),
                claims: Some(claims),
            }
        }
    };
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Resolved user on routes that require authentication.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        if !ctx.is_claimed() {
            return Err(AppError::Unauthorized("authentication required".into()));
        }
        let user = ctx.identity.require()?.clone();
        Ok(AuthUser(user))
    }
}
