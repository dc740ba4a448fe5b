// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache policy
//!
//! - Keys are cached by `kid` with no expiry
//! - A lookup for an unknown `kid` fetches the whole set and replaces the
//!   cache with every usable key from that fetch
//! - Concurrent fetches race; the last one to finish wins
//! - Lookup-driven refetches are throttled to one per
//!   `min_refetch_interval`, so unknown `kid`s cannot force a fetch per request
//! - Only P-256 keys usable for ES256 are admitted
//!
//! No retries happen here. [`TokenVerifier`](super::TokenVerifier) owns the
//! retry policy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm as JwkAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;

/// Timeout for a single key directory request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum spacing between lookup-driven directory fetches.
pub const DEFAULT_MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(10);

/// Signature algorithms a cached key may be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Es256,
}

impl KeyAlgorithm {
    pub fn as_jwt_algorithm(self) -> Algorithm {
        match self {
            KeyAlgorithm::Es256 => Algorithm::ES256,
        }
    }
}

/// A public key published by the key directory.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: KeyAlgorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Where a key returned by [`KeyDirectoryClient::get_key`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Served from the in-process cache; may be stale after a rotation.
    Cache,
    /// Fetched from the directory during this lookup.
    Directory,
}

/// Key lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyLookupError {
    #[error("key directory unreachable: {0}")]
    Unreachable(String),

    #[error("no usable key with id {0} in key directory")]
    NotFound(String),
}

type KeyMap = HashMap<String, SigningKey>;

#[derive(Default)]
struct CacheState {
    keys: KeyMap,
    fetched_at: Option<Instant>,
}

/// Client for the remote key directory with a process-wide cache.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct KeyDirectoryClient {
    jwks_url: Arc<str>,
    cache: Arc<RwLock<CacheState>>,
    client: reqwest::Client,
    min_refetch_interval: Duration,
}

impl KeyDirectoryClient {
    /// Create a client for the given JWKS endpoint.
    ///
    /// # Arguments
    /// - `jwks_url`: e.g. `https://auth.privy.io/api/v1/apps/<app-id>/jwks.json`
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self::with_client(jwks_url, client))
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: Arc::from(jwks_url.into()),
            cache: Arc::new(RwLock::new(CacheState::default())),
            client,
            min_refetch_interval: DEFAULT_MIN_REFETCH_INTERVAL,
        }
    }

    /// Override the minimum spacing between fetches triggered by lookups.
    /// `Duration::ZERO` disables throttling.
    pub fn with_min_refetch_interval(mut self, interval: Duration) -> Self {
        self.min_refetch_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Resolve a key by `kid`, fetching the directory on a cache miss.
    pub async fn get_key(&self, kid: &str) -> Result<(SigningKey, KeySource), KeyLookupError> {
        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.keys.get(kid).cloned() {
                return Ok((key, KeySource::Cache));
            }
            if self.throttled(&cache) {
                tracing::debug!(kid, "Signing key not cached, directory fetched recently");
                return Err(KeyLookupError::NotFound(kid.to_string()));
            }
        }

        tracing::debug!(kid, "Signing key not cached, fetching key directory");
        let keys = self.fetch_and_store().await?;
        keys.get(kid)
            .cloned()
            .map(|key| (key, KeySource::Directory))
            .ok_or_else(|| KeyLookupError::NotFound(kid.to_string()))
    }

    /// Refetch the directory and resolve `kid` from the fresh set, bypassing
    /// the cache. Used after a cached key failed to verify a signature.
    ///
    /// Within `min_refetch_interval` of the last fetch the cached set is
    /// considered fresh and no request is made.
    pub async fn refetch_key(&self, kid: &str) -> Result<SigningKey, KeyLookupError> {
        {
            let cache = self.cache.read().await;
            if self.throttled(&cache) {
                tracing::debug!(kid, "Skipping refetch, directory fetched recently");
                return cache
                    .keys
                    .get(kid)
                    .cloned()
                    .ok_or_else(|| KeyLookupError::NotFound(kid.to_string()));
            }
        }

        let keys = self.fetch_and_store().await?;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| KeyLookupError::NotFound(kid.to_string()))
    }

    /// Force refresh the cache. Returns the number of usable keys.
    pub async fn refresh(&self) -> Result<usize, KeyLookupError> {
        Ok(self.fetch_and_store().await?.len())
    }

    /// Whether any key is currently cached.
    pub async fn is_cached(&self) -> bool {
        !self.cache.read().await.keys.is_empty()
    }

    /// Cached key ids, sorted.
    pub async fn cached_key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache.read().await.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn throttled(&self, cache: &CacheState) -> bool {
        cache
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.min_refetch_interval)
    }

    /// Fetch the key set and replace the cache with it.
    ///
    /// The fetch runs in its own task: if the caller is dropped mid-flight the
    /// fetch still completes and populates the cache, and the result simply
    /// has nobody to be delivered to.
    async fn fetch_and_store(&self) -> Result<KeyMap, KeyLookupError> {
        let client = self.client.clone();
        let url = Arc::clone(&self.jwks_url);
        let cache = Arc::clone(&self.cache);

        let task = tokio::spawn(async move {
            let jwks = fetch_jwks(&client, &url).await?;
            let keys = admit_keys(&jwks);
            tracing::info!(key_count = keys.len(), "Fetched key directory");
            *cache.write().await = CacheState {
                keys: keys.clone(),
                fetched_at: Some(Instant::now()),
            };
            Ok::<_, KeyLookupError>(keys)
        });

        task.await
            .map_err(|e| KeyLookupError::Unreachable(format!("key fetch task failed: {e}")))?
    }
}

/// Fetch JWKS from the endpoint.
async fn fetch_jwks(client: &reqwest::Client, url: &str) -> Result<JwkSet, KeyLookupError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| KeyLookupError::Unreachable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(KeyLookupError::Unreachable(format!(
            "HTTP {} from key directory",
            response.status()
        )));
    }

    response
        .json::<JwkSet>()
        .await
        .map_err(|e| KeyLookupError::Unreachable(format!("invalid key directory document: {e}")))
}

/// Keep every key that can verify ES256 signatures, indexed by `kid`.
fn admit_keys(jwks: &JwkSet) -> KeyMap {
    let mut keys = HashMap::with_capacity(jwks.keys.len());
    for jwk in &jwks.keys {
        match signing_key_from_jwk(jwk) {
            Ok(key) => {
                keys.insert(key.key_id.clone(), key);
            }
            Err(reason) => {
                tracing::debug!(kid = ?jwk.common.key_id, reason, "Skipping key directory entry");
            }
        }
    }
    keys
}

fn signing_key_from_jwk(jwk: &Jwk) -> Result<SigningKey, &'static str> {
    let key_id = jwk
        .common
        .key_id
        .as_deref()
        .filter(|kid| !kid.is_empty())
        .ok_or("missing kid")?;

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err("encryption key");
    }

    match jwk.common.key_algorithm {
        None | Some(JwkAlgorithm::ES256) => {}
        Some(_) => return Err("algorithm is not ES256"),
    }

    let AlgorithmParameters::EllipticCurve(ec) = &jwk.algorithm else {
        return Err("not an elliptic curve key");
    };
    if !matches!(ec.curve, EllipticCurve::P256) {
        return Err("curve is not P-256");
    }

    let decoding_key =
        DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(|_| "invalid EC coordinates")?;

    Ok(SigningKey {
        key_id: key_id.to_string(),
        algorithm: KeyAlgorithm::Es256,
        decoding_key,
    })
}
