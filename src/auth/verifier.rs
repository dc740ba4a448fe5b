// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against the key directory.
//!
//! ## Checks, in order
//!
//! 1. A token is present
//! 2. The header parses and carries a `kid`
//! 3. The header algorithm is exactly ES256 (no negotiation)
//! 4. The unverified `exp` is not in the past
//! 5. The `kid` resolves to a key (one silent retry if the directory is down)
//! 6. Signature, issuer, audience, expiry and not-before all validate
//!
//! A signature failure with a cached key triggers one directory refetch and
//! one more attempt, to ride out key rotation.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::jwks::{KeyDirectoryClient, KeyLookupError, KeySource, SigningKey};
use super::{AuthError, VerifiedClaims};

/// The only accepted signature algorithm.
pub const PINNED_ALGORITHM: Algorithm = Algorithm::ES256;

/// Header `alg` value of the pinned algorithm.
const PINNED_ALG_NAME: &str = "ES256";

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Claims a token must carry to be accepted.
const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

#[derive(Debug, Deserialize)]
struct UnverifiedExpiry {
    #[serde(default)]
    exp: Option<i64>,
}

/// Verifies bearer tokens issued by the auth provider.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: KeyDirectoryClient,
    issuer: String,
    audience: String,
    leeway: u64,
}

impl TokenVerifier {
    /// # Arguments
    /// - `keys`: key directory client for the provider's JWKS
    /// - `issuer`: trusted `iss` value (`privy.io`)
    /// - `audience`: this application's ID, the expected `aud`
    pub fn new(
        keys: KeyDirectoryClient,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    /// Override the clock skew tolerance, in seconds.
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn key_directory(&self) -> &KeyDirectoryClient {
        &self.keys
    }

    /// Verify a bearer token and return its claims.
    pub async fn verify(&self, token: Option<&str>) -> Result<VerifiedClaims, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        check_pinned_algorithm(token)?;
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != PINNED_ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MalformedToken)?;

        self.reject_if_expired(token)?;

        let (key, source) = self.resolve_key(&kid).await?;
        match self.check(token, &key) {
            Err(AuthError::InvalidSignature) if source == KeySource::Cache => {
                tracing::info!(kid = %kid, "Signature failed with cached key, refetching key directory");
                let fresh = self
                    .keys
                    .refetch_key(&kid)
                    .await
                    .map_err(|e| lookup_error(&kid, e))?;
                self.check(token, &fresh)
            }
            result => result,
        }
    }

    /// Reject expired tokens before any key lookup or signature work. The
    /// payload is unverified here, so this can only ever reject.
    fn reject_if_expired(&self, token: &str) -> Result<(), AuthError> {
        let unverified = jsonwebtoken::dangerous::insecure_decode::<UnverifiedExpiry>(token)
            .map_err(|_| AuthError::MalformedToken)?;
        if let Some(exp) = unverified.claims.exp {
            if exp < Utc::now().timestamp() - self.leeway as i64 {
                return Err(AuthError::Expired);
            }
        }
        Ok(())
    }

    async fn resolve_key(&self, kid: &str) -> Result<(SigningKey, KeySource), AuthError> {
        match self.keys.get_key(kid).await {
            Err(KeyLookupError::Unreachable(reason)) => {
                tracing::warn!(kid, reason = %reason, "Key directory unreachable, retrying once");
                self.keys.get_key(kid).await.map_err(|e| lookup_error(kid, e))
            }
            other => other.map_err(|e| lookup_error(kid, e)),
        }
    }

    fn check(&self, token: &str, key: &SigningKey) -> Result<VerifiedClaims, AuthError> {
        let mut validation = Validation::new(key.algorithm().as_jwt_algorithm());
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        let data = decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
                ErrorKind::InvalidAlgorithm => {
                    AuthError::UnsupportedAlgorithm("key algorithm mismatch".to_string())
                }
                _ => AuthError::MalformedToken,
            })?;

        VerifiedClaims::from_validated(data.claims, &self.audience)
    }
}

/// Compare the raw header `alg` against the pinned value before the typed
/// header parse, which cannot represent `none` or unknown algorithms.
fn check_pinned_algorithm(token: &str) -> Result<(), AuthError> {
    let (segment, _) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
    let bytes = Base64UrlUnpadded::decode_vec(segment.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)?;
    let header: Map<String, Value> =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;

    match header.get("alg") {
        None => Err(AuthError::MalformedToken),
        Some(Value::String(alg)) if alg == PINNED_ALG_NAME => Ok(()),
        Some(Value::String(alg)) => Err(AuthError::UnsupportedAlgorithm(alg.clone())),
        Some(other) => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn lookup_error(kid: &str, error: KeyLookupError) -> AuthError {
    match error {
        KeyLookupError::NotFound(_) => AuthError::UnknownKey(kid.to_string()),
        KeyLookupError::Unreachable(reason) => AuthError::KeyDirectoryUnavailable(reason),
    }
}
