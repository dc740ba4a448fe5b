// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Variants are fine-grained so each rejection path is testable and logged,
//! but the response body only names a coarse category. A client cannot tell
//! an unknown key from a bad signature.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Reason a bearer token was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("no bearer token provided")]
    MissingToken,
    /// Header is not `Bearer <token>` or the token cannot be parsed.
    #[error("token is malformed")]
    MalformedToken,
    /// Header declares an algorithm other than ES256.
    #[error("token algorithm {0} is not accepted")]
    UnsupportedAlgorithm(String),
    /// The key directory has no key with this `kid`.
    #[error("no signing key with id {0}")]
    UnknownKey(String),
    /// Signature does not verify against the resolved key.
    #[error("token signature is invalid")]
    InvalidSignature,
    /// `iss` is not the trusted issuer.
    #[error("token issuer is not trusted")]
    IssuerMismatch,
    /// `aud` is not this application.
    #[error("token audience does not match")]
    AudienceMismatch,
    /// `exp` is in the past.
    #[error("token has expired")]
    Expired,
    /// `nbf` is in the future.
    #[error("token is not yet valid")]
    NotYetValid,
    /// The key directory could not be reached after one retry.
    #[error("key directory unavailable: {0}")]
    KeyDirectoryUnavailable(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
}

impl AuthError {
    /// Stable machine-readable code, used in logs only.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::KeyDirectoryUnavailable(_) => "key_directory_unavailable",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::MalformedToken => StatusCode::UNAUTHORIZED,
            AuthError::UnsupportedAlgorithm(_)
            | AuthError::UnknownKey(_)
            | AuthError::InvalidSignature
            | AuthError::IssuerMismatch
            | AuthError::AudienceMismatch
            | AuthError::Expired
            | AuthError::NotYetValid => StatusCode::FORBIDDEN,
            AuthError::KeyDirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Category shown to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "No token provided.",
            AuthError::MalformedToken => "Malformed token.",
            AuthError::KeyDirectoryUnavailable(_) => "Authentication service unavailable.",
            _ => "Invalid token.",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::KeyDirectoryUnavailable(_) => {
                tracing::error!(error_code = self.error_code(), reason = %self, "Token verification could not complete");
            }
            _ => {
                tracing::warn!(error_code = self.error_code(), reason = %self, "Rejected bearer token");
            }
        }

        let body = Json(AuthErrorBody {
            error: self.public_message(),
        });
        (self.status_code(), body).into_response()
    }
}
