// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Privy access-token verification for the wallet-link API.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with Privy
//! 2. Frontend sends `Authorization: Bearer <Privy access token>`
//! 3. Server:
//!    - Resolves the token's `kid` against the Privy JWKS (cached)
//!    - Verifies ES256 signature, expiry, issuer, audience
//!    - Exposes `sub` as the caller identity
//!
//! ## Security
//!
//! - Only ES256 is accepted, whatever the token header claims
//! - Rejection reasons are logged but collapse to one public message
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod verifier;

pub use claims::VerifiedClaims;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::{KeyDirectoryClient, KeyLookupError, KeySource, SigningKey};
pub use verifier::TokenVerifier;
