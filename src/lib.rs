// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Link Server - token-gated backend for a wallet-linking front-end
//!
//! Verifies Privy access tokens against the app's key directory and issues
//! HMAC-signed MoonPay on-ramp URLs to authenticated callers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer token verification (Privy JWKS, ES256)
//! - `config` - Environment configuration and tracing setup
//! - `identity` - Linked identities and the last-identity unlink rule
//! - `providers` - On-ramp URL signing (MoonPay)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod providers;
pub mod state;

#[cfg(test)]
mod testutil;
