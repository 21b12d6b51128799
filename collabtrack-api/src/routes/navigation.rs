/// Navigation gate endpoint
///
/// The web client asks before rendering a page whether it should render it or
/// redirect. The bearer token is optional; a missing, malformed or expired token
/// counts as signed out.
///
/// # Endpoint
///
/// ```text
/// POST /v1/navigation/resolve
/// Authorization: Bearer <access token>   (optional)
///
/// { "path": "/projects" }
/// ```
///
/// # Response
///
/// ```json
/// { "action": "redirect", "to": "/verify-email" }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::HeaderMap, Json};
use collabtrack_shared::auth::{
    gate::{self, GateDecision, Session},
    middleware::authenticate_optional,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub path: String,
}

pub async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<GateDecision>> {
    if !req.path.starts_with('/') {
        return Err(ApiError::field("path", "Path must start with '/'"));
    }

    let session = authenticate_optional(&headers, state.jwt_secret()).map(|auth| Session {
        email_verified: auth.email_verified,
    });

    let decision = gate::resolve(session, &req.path);
    tracing::debug!(path = %req.path, signed_in = session.is_some(), ?decision, "Resolved navigation");

    Ok(Json(decision))
}
