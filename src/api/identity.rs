// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::identity::{authorize_unlink, UnlinkTarget, UserProfile};

pub const PROFILE_MISMATCH: &str = "Profile does not belong to the authenticated user.";

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnlinkCheckRequest {
    /// The caller's user object as held by the client.
    pub user: UserProfile,
    /// The identity the client intends to unlink.
    pub target: UnlinkTarget,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkCheckResponse {
    pub can_unlink: bool,
}

/// Check whether the caller may unlink `target` without losing their last
/// identity.
#[utoipa::path(
    post,
    path = "/api/identity/unlink-check",
    tag = "Identity",
    request_body = UnlinkCheckRequest,
    responses(
        (status = 200, description = "Unlink is allowed", body = UnlinkCheckResponse),
        (status = 400, description = "Unreadable body"),
        (status = 401, description = "Missing or malformed bearer token"),
        (status = 403, description = "Token failed verification or profile mismatch"),
        (status = 404, description = "Target is not linked to the user"),
        (status = 409, description = "Target is the last remaining identity")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlink_check(
    Auth(claims): Auth,
    body: Result<Json<UnlinkCheckRequest>, JsonRejection>,
) -> Result<Json<UnlinkCheckResponse>, ApiError> {
    let Json(request) = body?;

    if request.user.id != claims.subject() {
        warn!(
            subject = claims.subject(),
            profile_id = %request.user.id,
            "Unlink check for another user's profile"
        );
        return Err(ApiError::new(StatusCode::FORBIDDEN, PROFILE_MISMATCH));
    }

    let identities = request.user.identities();
    authorize_unlink(&identities, &request.target).map_err(|e| {
        info!(subject = claims.subject(), reason = %e, "Unlink refused");
        ApiError::from(e)
    })?;

    Ok(Json(UnlinkCheckResponse { can_unlink: true }))
}
