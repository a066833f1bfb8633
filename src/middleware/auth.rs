// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token authentication middleware.

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller extracted from a verified access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

/// Pull the token out of an `Authorization` value. Accepts `Bearer <token>`
/// with any casing of the scheme, or the bare token.
pub fn extract_token(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_token)
        .ok_or(AppError::Unauthorized)?;

    let claims = state.session.authenticate(token)?;
    let user_id = claims.user_id().map_err(|_| AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

/// Middleware that admits only admins. Must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = *request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AppError::Unauthorized)?;

    match user.role {
        Role::Admin => Ok(next.run(request).await),
        Role::Student => {
            tracing::debug!(user_id = user.user_id, "Admin route refused");
            Err(AppError::Forbidden)
        }
    }
}
