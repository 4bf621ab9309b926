//! Token and role gates for protected routes.
//!
//! `require_auth` verifies the bearer token and inserts the caller's `Identity`
//! into the request extensions. Role gates (`admin_only`, `require_roles`) read
//! that identity back, so they must be layered inside `require_auth`:
//!
//! ```ignore
//! get(handler)
//!     .route_layer(middleware::from_fn(admin_only))
//!     .route_layer(middleware::from_fn_with_state(keys, require_auth))
//! ```

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    claims::{Identity, Role},
    jwt::JwtKeys,
};
use crate::error::{AppError, AuthError};

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Permits the identity iff its role is one of `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Permits admins, or the user acting on their own record.
pub fn authorize_owner(identity: &Identity, user_id: Uuid) -> Result<(), AuthError> {
    if identity.subject == user_id {
        return Ok(());
    }
    authorize(identity, ADMIN_ONLY)
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let (scheme, token) = value.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(keys): State<Arc<JwtKeys>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        warn!(uri = %req.uri(), "missing or malformed Authorization header");
        return Err(AuthError::Invalid.into());
    };

    let identity = keys.verify(token).map_err(|e| {
        warn!(uri = %req.uri(), "invalid or expired token");
        e
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

pub async fn require_roles(
    allowed: &'static [Role],
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        error!(uri = %req.uri(), "role gate reached without an authenticated identity");
        return Err(AppError::MissingIdentity);
    };

    if let Err(e) = authorize(identity, allowed) {
        warn!(user_id = %identity.subject, role = %identity.role, uri = %req.uri(), "role not permitted");
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

pub async fn admin_only(req: Request, next: Next) -> Result<Response, AppError> {
    require_roles(ADMIN_ONLY, req, next).await
}

/// Identity attached by `require_auth`.
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(identity) => Ok(CurrentUser(*identity)),
            None => {
                error!(uri = %parts.uri, "CurrentUser used on a route without the token gate");
                Err(AppError::MissingIdentity)
            }
        }
    }
}
