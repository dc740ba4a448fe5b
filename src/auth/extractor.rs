// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for verified callers.
//!
//! `Auth` is the verification gate. Extractors implementing
//! `FromRequestParts` run before the body is read, so a handler taking
//! `Auth` first never sees its body, configuration or secrets unless the
//! token verified:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth, Json(body): Json<Body>) -> impl IntoResponse {
//!     // claims.subject() is the authenticated user
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, VerifiedClaims};
use crate::state::AppState;

/// Extractor for verified callers.
pub struct Auth(pub VerifiedClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.verifier.verify(Some(token)).await?;
        tracing::debug!(subject = claims.subject(), "Authenticated request");
        Ok(Auth(claims))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// A missing header is `MissingToken`; anything present but not a usable
/// bearer credential is `MalformedToken`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedToken)?
        .trim();

    if value.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedToken);
    }
    Ok(token)
}
