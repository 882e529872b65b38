//! Account handlers and the session checks other handlers share.

use super::{ApiError, AppState};
use crate::auth::{require_role, Identity, Role};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;

/// Concrete return type for JSON handlers.
pub(crate) type ApiResponse = Result<(StatusCode, Json<serde_json::Value>), ApiError>;

#[derive(Deserialize)]
pub(crate) struct RegisterBody {
    username: String,
    password: String,
    role: String,
}

#[derive(Deserialize)]
pub(crate) struct LoginBody {
    username: String,
    password: String,
    #[serde(default)]
    remember_me: bool,
}

pub(crate) fn invalid_json(rejection: &JsonRejection) -> ApiError {
    ApiError::InvalidRequest(format!("Invalid request: {}", rejection.body_text()))
}

/// Resolve the caller's identity from the session cookie.
pub(crate) fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    Ok(state.gate.authenticate(headers)?)
}

/// Like [`require_session`], but only admins pass.
pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let identity = require_session(state, headers)?;
    require_role(&identity, Role::Admin)?;
    Ok(identity)
}

/// POST /register/: Create an account.
pub(crate) async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResponse {
    if !state.allow_registration {
        return Err(ApiError::RegistrationDisabled);
    }
    let Json(body) = body.map_err(|e| invalid_json(&e))?;

    // bcrypt is CPU-bound; keep it off the async workers.
    let gate = Arc::clone(&state.gate);
    let identity =
        tokio::task::spawn_blocking(move || gate.register(&body.username, &body.password, &body.role))
            .await
            .map_err(ApiError::internal)??;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "User registered successfully!",
            "username": identity.username,
            "role": identity.role,
        })),
    ))
}

/// POST /login/: Verify credentials and set the session cookie.
pub(crate) async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| invalid_json(&e))?;

    let gate = Arc::clone(&state.gate);
    let session = tokio::task::spawn_blocking(move || {
        gate.login(&body.username, &body.password, body.remember_me)
    })
    .await
    .map_err(ApiError::internal)??;

    let cookie = state
        .gate
        .cookie()
        .attach(&session.token)
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "message": "Logged in successfully",
            "username": session.claim.identity.username,
            "role": session.claim.identity.role,
            "expires_at": session.claim.expires_at,
        })),
    )
        .into_response())
}

/// POST /logout/: Clear the session cookie.
///
/// Tokens are not tracked server-side, so a copy of the token kept elsewhere
/// stays valid until it expires.
pub(crate) async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers)?;
    let cleared = state.gate.cookie().detach().map_err(ApiError::internal)?;
    tracing::info!(username = %identity.username, "Logged out");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cleared)],
        Json(serde_json::json!({"message": "Logged out successfully"})),
    )
        .into_response())
}

/// GET /me: The identity behind the current session.
pub(crate) async fn handle_me(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let identity = require_session(&state, &headers)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "username": identity.username,
            "role": identity.role,
        })),
    ))
}
