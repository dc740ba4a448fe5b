// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::AuthError;

/// Claims of a token that passed every check in
/// [`TokenVerifier::verify`](super::TokenVerifier::verify).
///
/// There is no public constructor: holding a `VerifiedClaims` proves the
/// token behind it was verified. `subject` is the caller's identity for all
/// downstream authorization.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    subject: String,
    issuer: String,
    audience: String,
    session_id: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    raw: Map<String, Value>,
}

impl VerifiedClaims {
    /// Build from a claim map whose signature, issuer, audience and expiry
    /// have already been validated.
    pub(crate) fn from_validated(
        raw: Map<String, Value>,
        audience: &str,
    ) -> Result<Self, AuthError> {
        let subject = string_claim(&raw, "sub").ok_or(AuthError::MalformedToken)?;
        let issuer = string_claim(&raw, "iss").ok_or(AuthError::MalformedToken)?;
        let expires_at = timestamp_claim(&raw, "exp").ok_or(AuthError::MalformedToken)?;
        let issued_at = timestamp_claim(&raw, "iat");
        let session_id = string_claim(&raw, "sid");

        Ok(Self {
            subject,
            issuer,
            audience: audience.to_string(),
            session_id,
            issued_at,
            expires_at,
            raw,
        })
    }

    /// Authenticated user identifier (Privy DID).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The audience that matched this application.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Privy session ID, if present.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Every claim in the payload, including ones not modelled above.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

fn string_claim(raw: &Map<String, Value>, name: &str) -> Option<String> {
    raw.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp_claim(raw: &Map<String, Value>, name: &str) -> Option<DateTime<Utc>> {
    let value = raw.get(name)?;
    let secs = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))?;
    DateTime::from_timestamp(secs, 0)
}
