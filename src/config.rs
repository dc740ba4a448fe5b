// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. Missing
//! required values are fatal: the server refuses to start rather than
//! failing individual requests later.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MOONPAY_PUBLIC_KEY` | MoonPay publishable API key | Required |
//! | `MOONPAY_SECRET_KEY` | MoonPay secret used to sign on-ramp URLs | Required |
//! | `PRIVY_APP_ID` | Privy app ID, expected JWT audience | Required |
//! | `PRIVY_ISSUER` | Expected JWT issuer claim (`privy.io`) | Required |
//! | `PRIVY_JWKS_URL` | Privy JWKS endpoint | Derived from `PRIVY_APP_ID` |
//! | `MOONPAY_BASE_URL` | On-ramp widget base URL | `https://buy-sandbox.moonpay.com` |
//! | `MOONPAY_CURRENCY_CODE` | Pre-selected purchase currency | `eth` |
//! | `CORS_ALLOWED_ORIGIN` | Front-end origin allowed by CORS | Permissive |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | Plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const MOONPAY_PUBLIC_KEY_ENV: &str = "MOONPAY_PUBLIC_KEY";
pub const MOONPAY_SECRET_KEY_ENV: &str = "MOONPAY_SECRET_KEY";
pub const MOONPAY_BASE_URL_ENV: &str = "MOONPAY_BASE_URL";
pub const MOONPAY_CURRENCY_CODE_ENV: &str = "MOONPAY_CURRENCY_CODE";
pub const PRIVY_APP_ID_ENV: &str = "PRIVY_APP_ID";
pub const PRIVY_ISSUER_ENV: &str = "PRIVY_ISSUER";
pub const PRIVY_JWKS_URL_ENV: &str = "PRIVY_JWKS_URL";
pub const CORS_ALLOWED_ORIGIN_ENV: &str = "CORS_ALLOWED_ORIGIN";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Sandbox widget; production deployments set `MOONPAY_BASE_URL`.
pub const DEFAULT_MOONPAY_BASE_URL: &str = "https://buy-sandbox.moonpay.com";
pub const DEFAULT_CURRENCY_CODE: &str = "eth";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Transport security settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Fully resolved server configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub moonpay_public_key: String,
    pub moonpay_secret_key: String,
    pub moonpay_base_url: String,
    pub currency_code: String,
    pub privy_app_id: String,
    pub privy_issuer: String,
    pub jwks_url: String,
    pub cors_allowed_origin: Option<String>,
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("moonpay_public_key", &self.moonpay_public_key)
            .field("moonpay_secret_key", &"<redacted>")
            .field("moonpay_base_url", &self.moonpay_base_url)
            .field("currency_code", &self.currency_code)
            .field("privy_app_id", &self.privy_app_id)
            .field("privy_issuer", &self.privy_issuer)
            .field("jwks_url", &self.jwks_url)
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .field("bind_addr", &self.bind_addr)
            .field("tls", &self.tls)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Values are trimmed; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let moonpay_secret_key = env.required(MOONPAY_SECRET_KEY_ENV)?;
        let moonpay_public_key = env.required(MOONPAY_PUBLIC_KEY_ENV)?;
        let privy_app_id = env.required(PRIVY_APP_ID_ENV)?;
        let privy_issuer = env.required(PRIVY_ISSUER_ENV)?;

        let jwks_url = env
            .optional(PRIVY_JWKS_URL_ENV)
            .unwrap_or_else(|| default_jwks_url(&privy_app_id));
        validate_url(PRIVY_JWKS_URL_ENV, &jwks_url)?;

        let moonpay_base_url = env.or_default(MOONPAY_BASE_URL_ENV, DEFAULT_MOONPAY_BASE_URL);
        validate_url(MOONPAY_BASE_URL_ENV, &moonpay_base_url)?;

        let currency_code =
            env.or_default(MOONPAY_CURRENCY_CODE_ENV, DEFAULT_CURRENCY_CODE).to_ascii_lowercase();

        let host = env.or_default("HOST", DEFAULT_HOST);
        let port = match env.optional("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "HOST",
                reason: e.to_string(),
            })?;

        let tls = match (env.optional(TLS_CERT_PATH_ENV), env.optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            moonpay_public_key,
            moonpay_secret_key,
            moonpay_base_url,
            currency_code,
            privy_app_id,
            privy_issuer,
            jwks_url,
            cors_allowed_origin: env.optional(CORS_ALLOWED_ORIGIN_ENV),
            bind_addr,
            tls,
        })
    }
}

/// Privy publishes one JWKS document per app.
pub fn default_jwks_url(app_id: &str) -> String {
    format!("https://auth.privy.io/api/v1/apps/{app_id}/jwks.json")
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`; `LOG_FORMAT=json` switches to
/// structured JSON lines.
pub fn setup_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::registry().with(filter);

    match std::env::var(LOG_FORMAT_ENV).ok().as_deref() {
        Some("json") => subscriber.with(tracing_fmt::layer().json()).init(),
        _ => subscriber.with(tracing_fmt::layer()).init(),
    }
}
