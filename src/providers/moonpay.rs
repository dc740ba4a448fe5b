// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! MoonPay on-ramp URL signing.
//!
//! MoonPay recomputes the signature from the query string it receives, so
//! the serialization here is part of the wire contract:
//!
//! - parameters in the order `apiKey`, `walletAddress`, `redirectURL`,
//!   `email`, `currencyCode`
//! - `application/x-www-form-urlencoded` encoding
//! - `signature = base64(HMAC-SHA256(secret, "?" + query))`, appended last

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::config::{AppConfig, DEFAULT_CURRENCY_CODE, DEFAULT_MOONPAY_BASE_URL};

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_PARAM: &str = "apiKey";
pub const WALLET_ADDRESS_PARAM: &str = "walletAddress";
pub const REDIRECT_URL_PARAM: &str = "redirectURL";
pub const EMAIL_PARAM: &str = "email";
pub const CURRENCY_CODE_PARAM: &str = "currencyCode";
pub const SIGNATURE_PARAM: &str = "signature";

/// Validated on-ramp parameters supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnrampRequest {
    pub wallet_address: String,
    pub email: String,
    pub redirect_url: String,
}

/// An on-ramp URL whose `signature` parameter covers every parameter
/// before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    url: Url,
    signed_payload: String,
    signature: String,
}

impl SignedUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base64 signature, before URL encoding.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The exact bytes that were signed: `?` followed by the query string
    /// without the signature.
    pub fn signed_payload(&self) -> &str {
        &self.signed_payload
    }

    /// Decoded query parameters in transmission order.
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn into_string(self) -> String {
        self.url.into()
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Signing failure. Every variant is a server misconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("MoonPay API key is not configured")]
    MissingApiKey,

    #[error("MoonPay secret key is not configured")]
    MissingSecretKey,

    #[error("MoonPay secret key is unusable")]
    InvalidSecretKey,

    #[error("MoonPay base URL is invalid: {0}")]
    InvalidBaseUrl(String),
}

/// Builds signed MoonPay widget URLs.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    secret_key: String,
    base_url: String,
    currency_code: String,
    issued: Arc<AtomicU64>,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("currency_code", &self.currency_code)
            .finish()
    }
}

impl RequestSigner {
    /// Signer against the sandbox widget, pre-selecting ETH.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            base_url: DEFAULT_MOONPAY_BASE_URL.to_string(),
            currency_code: DEFAULT_CURRENCY_CODE.to_string(),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.moonpay_public_key, &config.moonpay_secret_key)
            .with_base_url(&config.moonpay_base_url)
            .with_currency_code(&config.currency_code)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_currency_code(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = currency_code.into();
        self
    }

    /// Number of URLs this signer (and its clones) has issued.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Build and sign the on-ramp URL for `request`.
    pub fn sign(&self, request: &OnrampRequest) -> Result<SignedUrl, SignError> {
        if self.api_key.trim().is_empty() {
            return Err(SignError::MissingApiKey);
        }
        if self.secret_key.is_empty() {
            return Err(SignError::MissingSecretKey);
        }

        let mut url =
            Url::parse(&self.base_url).map_err(|e| SignError::InvalidBaseUrl(e.to_string()))?;
        url.set_query(None);
        url.set_fragment(None);

        url.query_pairs_mut()
            .append_pair(API_KEY_PARAM, &self.api_key)
            .append_pair(WALLET_ADDRESS_PARAM, &request.wallet_address)
            .append_pair(REDIRECT_URL_PARAM, &request.redirect_url)
            .append_pair(EMAIL_PARAM, &request.email)
            .append_pair(CURRENCY_CODE_PARAM, &self.currency_code);

        let signed_payload = format!("?{}", url.query().unwrap_or_default());
        let signature = self.signature_for(&signed_payload)?;

        url.query_pairs_mut()
            .append_pair(SIGNATURE_PARAM, &signature);

        self.issued.fetch_add(1, Ordering::Relaxed);
        Ok(SignedUrl {
            url,
            signed_payload,
            signature,
        })
    }

    /// Signature MoonPay expects for `query`. A leading `?` is added when
    /// absent, so both `"?a=1"` and `"a=1"` sign the same bytes.
    pub fn signature_for(&self, query: &str) -> Result<String, SignError> {
        if self.secret_key.is_empty() {
            return Err(SignError::MissingSecretKey);
        }
        compute_signature(self.secret_key.as_bytes(), query)
    }
}

fn compute_signature(secret: &[u8], query: &str) -> Result<String, SignError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|_| SignError::InvalidSecretKey)?;
    if !query.starts_with('?') {
        mac.update(b"?");
    }
    mac.update(query.as_bytes());
    Ok(Base64::encode_string(&mac.finalize().into_bytes()))
}
