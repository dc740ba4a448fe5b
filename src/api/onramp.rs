// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed on-ramp URL issuance.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::{ApiError, MISSING_PARAMETERS};
use crate::providers::moonpay::OnrampRequest;
use crate::state::AppState;

/// Request body for `POST /api/onramp`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnrampBody {
    /// Destination wallet address.
    #[schema(example = "0xABC1230000000000000000000000000000000DEF")]
    pub address: Option<String>,
    #[schema(example = "alice@example.com")]
    pub email: Option<String>,
    /// Where the provider sends the user after checkout.
    #[schema(example = "https://wallet.example.com/funded")]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OnrampResponse {
    /// Signed provider URL to open in the browser.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        warn!(error = %err, "Rejected on-ramp request");
        ApiError::bad_request(MISSING_PARAMETERS)
    }
}

impl OnrampBody {
    /// Every field must be present and non-blank.
    pub fn validate(self) -> Result<OnrampRequest, ValidationError> {
        let address = required(self.address);
        let email = required(self.email);
        let redirect_url = required(self.redirect_url);

        match (address, email, redirect_url) {
            (Some(wallet_address), Some(email), Some(redirect_url)) => Ok(OnrampRequest {
                wallet_address,
                email,
                redirect_url,
            }),
            (address, email, redirect_url) => {
                let missing = [
                    ("address", address.is_none()),
                    ("email", email.is_none()),
                    ("redirectUrl", redirect_url.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(ValidationError::MissingFields(missing))
            }
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue a signed on-ramp URL for the authenticated user.
#[utoipa::path(
    post,
    path = "/api/onramp",
    tag = "Onramp",
    request_body = OnrampBody,
    responses(
        (status = 200, description = "Signed on-ramp URL", body = OnrampResponse),
        (status = 400, description = "Missing required parameters or unreadable body"),
        (status = 401, description = "Missing or malformed bearer token"),
        (status = 403, description = "Token failed verification"),
        (status = 500, description = "On-ramp signing is misconfigured"),
        (status = 503, description = "Key directory unavailable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_onramp_url(
    Auth(claims): Auth,
    State(state): State<AppState>,
    body: Result<Json<OnrampBody>, JsonRejection>,
) -> Result<Json<OnrampResponse>, ApiError> {
    let Json(body) = body?;
    let request = body.validate()?;

    let signed = state.signer.sign(&request).map_err(|e| {
        error!(error = %e, "On-ramp signing failed");
        ApiError::internal()
    })?;

    info!(
        subject = claims.subject(),
        wallet_address = %request.wallet_address,
        "Issued on-ramp URL"
    );

    Ok(Json(OnrampResponse {
        url: signed.into_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::providers::moonpay::RequestSigner;
    use crate::testutil::{
        craft_token, expired_claims, mint_token, test_state, test_verifier, valid_claims,
        valid_token, JwksServer, PRIMARY_KID, PRIMARY_PEM, TEST_API_KEY,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tower_http::cors::CorsLayer;

    const WALLET: &str = "0xABC1230000000000000000000000000000000DEF";

    fn app(state: AppState) -> Router {
        router(state, CorsLayer::permissive())
    }

    fn onramp_request(token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/onramp")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn full_body() -> Value {
        json!({
            "address": WALLET,
            "email": "a@b.com",
            "redirectUrl": "https://app/callback"
        })
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn validate_names_every_missing_field() {
        let body = OnrampBody {
            address: Some("  ".to_string()),
            email: None,
            redirect_url: Some("https://app/callback".to_string()),
        };
        assert_eq!(
            body.validate().unwrap_err(),
            ValidationError::MissingFields(vec!["address", "email"])
        );
    }

    #[test]
    fn validate_trims_values() {
        let body = OnrampBody {
            address: Some(format!(" {WALLET} ")),
            email: Some("a@b.com".to_string()),
            redirect_url: Some("https://app/callback".to_string()),
        };
        assert_eq!(body.validate().unwrap().wallet_address, WALLET);
    }

    #[tokio::test]
    async fn valid_request_returns_signed_url() {
        let server = JwksServer::with_primary_key().await;
        let state = test_state(&server.url());
        let signer = state.signer.clone();

        let response = app(state)
            .oneshot(onramp_request(Some(&valid_token()), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let url = url::Url::parse(body["url"].as_str().unwrap()).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(params[0], ("apiKey".to_string(), TEST_API_KEY.to_string()));
        assert_eq!(params[1], ("walletAddress".to_string(), WALLET.to_string()));
        assert_eq!(params[5].0, "signature");
        assert_eq!(params[5].1.len(), 44);
        assert_eq!(
            params[5].1,
            "VVnwQdmZHPgnE1fhUkFWrWQEl8wtGC47ZuQnh/KAmeo="
        );
        assert_eq!(signer.issued(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_without_signing() {
        let server = JwksServer::with_primary_key().await;
        let state = test_state(&server.url());
        let signer = state.signer.clone();
        let token = mint_token(PRIMARY_PEM, Some(PRIMARY_KID), &expired_claims());

        let response = app(state)
            .oneshot(onramp_request(Some(&token), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(response).await, json!({ "error": "Invalid token." }));
        assert_eq!(signer.issued(), 0);
    }

    #[tokio::test]
    async fn unsigned_token_is_forbidden() {
        let server = JwksServer::with_primary_key().await;
        let state = test_state(&server.url());
        let signer = state.signer.clone();
        let token = craft_token(
            &json!({ "alg": "none", "typ": "JWT", "kid": PRIMARY_KID }),
            &valid_claims(),
            "",
        );

        let response = app(state)
            .oneshot(onramp_request(Some(&token), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(response).await, json!({ "error": "Invalid token." }));
        assert_eq!(signer.issued(), 0);
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn missing_email_is_bad_request() {
        let server = JwksServer::with_primary_key().await;
        let state = test_state(&server.url());
        let signer = state.signer.clone();
        let body = json!({ "address": WALLET, "redirectUrl": "https://app/callback" });

        let response = app(state)
            .oneshot(onramp_request(Some(&valid_token()), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Missing required parameters." })
        );
        assert_eq!(signer.issued(), 0);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let server = JwksServer::with_primary_key().await;
        let response = app(test_state(&server.url()))
            .oneshot(onramp_request(None, full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await, json!({ "error": "No token provided." }));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn malformed_token_is_unauthorized() {
        let server = JwksServer::with_primary_key().await;
        let response = app(test_state(&server.url()))
            .oneshot(onramp_request(Some("not-a-jwt"), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await, json!({ "error": "Malformed token." }));
    }

    #[tokio::test]
    async fn unauthenticated_garbage_body_is_rejected_as_auth_failure() {
        let server = JwksServer::with_primary_key().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/onramp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app(test_state(&server.url())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_garbage_body_is_bad_request() {
        let server = JwksServer::with_primary_key().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/onramp")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", valid_token()))
            .body(Body::from("{not json"))
            .unwrap();

        let response = app(test_state(&server.url())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({ "error": "Invalid request body." }));
    }

    #[tokio::test]
    async fn misconfigured_signer_is_internal_error() {
        let server = JwksServer::with_primary_key().await;
        let state = AppState::new(
            test_verifier(&server.url()),
            RequestSigner::new(TEST_API_KEY, ""),
        );

        let response = app(state)
            .oneshot(onramp_request(Some(&valid_token()), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(response).await, json!({ "error": "Internal server error." }));
    }

    #[tokio::test]
    async fn unreachable_directory_is_service_unavailable() {
        let state = test_state(&crate::testutil::unreachable_jwks_url());

        let response = app(state)
            .oneshot(onramp_request(Some(&valid_token()), full_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Authentication service unavailable." })
        );
    }
}
