// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{ConfigError, CORS_ALLOWED_ORIGIN_ENV};
use crate::identity::{ProfileEmail, ProviderAccount, UnlinkTarget, UserProfile};
use crate::state::AppState;

pub mod health;
pub mod identity;
pub mod onramp;

/// Build the application router.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let api_routes = Router::new()
        .route("/onramp", post(onramp::create_onramp_url))
        .route("/identity/unlink-check", post(identity::unlink_check));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// CORS policy: a single allowed origin when configured, permissive otherwise.
pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer, ConfigError> {
    let Some(origin) = allowed_origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::Invalid {
            name: CORS_ALLOWED_ORIGIN_ENV,
            reason: e.to_string(),
        })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        onramp::create_onramp_url,
        identity::unlink_check,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            onramp::OnrampBody,
            onramp::OnrampResponse,
            identity::UnlinkCheckRequest,
            identity::UnlinkCheckResponse,
            UnlinkTarget,
            UserProfile,
            ProviderAccount,
            ProfileEmail,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Onramp", description = "Signed fiat on-ramp URLs"),
        (name = "Identity", description = "Linked identity checks"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_state, unreachable_jwks_url};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        router(test_state(&unreachable_jwks_url()), CorsLayer::permissive())
    }

    #[tokio::test]
    async fn liveness_route_is_mounted() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let response = app()
            .oneshot(Request::get("/api-doc/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/onramp"]["post"].is_object());
        assert!(doc["paths"]["/api/identity/unlink-check"]["post"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn onramp_rejects_get() {
        let response = app()
            .oneshot(Request::get("/api/onramp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn cors_layer_accepts_origin() {
        assert!(cors_layer(Some("https://wallet.example.com")).is_ok());
        assert!(cors_layer(None).is_ok());
    }

    #[test]
    fn cors_layer_rejects_invalid_origin() {
        assert!(matches!(
            cors_layer(Some("bad\norigin")),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
