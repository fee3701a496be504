//! Authentication handlers
//!
//! Thin HTTP shims over the account resolver: deserialize the payload, run
//! the flow, shape the `{success, user, token}` / `{error}` / `{loggedIn}`
//! response envelopes, and manage the session cookie.

use axum::extract::{Extension, Json};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::extractors::SESSION_COOKIE;
use super::google::GoogleVerifier;
use super::models::{AuthSession, GoogleLoginRequest, LoginRequest, RegisterRequest, UserInfo};
use super::resolver::{self, AuthFlowError, SessionIdentity};
use crate::common::{ApiError, AppState};

/// GET /status
/// Liveness probe
pub async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "OK"}))
}

/// POST /login
/// Authenticates a local account via email and password
///
/// # Request Body
/// ```json
/// {
///   "email": "a@b.com",
///   "password": "longenough"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "success": true,
///   "token": "<userId>:<sessionToken>",
///   "user": { ... }
/// }
/// ```
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    let session = resolver::login_with_password(&state.db, &payload.email, &payload.password)
        .await
        .map_err(ApiError::from)?;

    Ok(session_response(session))
}

/// POST /register
/// Creates a local account and logs it in
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    let session = resolver::register_with_password(&state.db, &payload)
        .await
        .map_err(ApiError::from)?;

    Ok(session_response(session))
}

/// POST /google-login
/// Authenticates via a Google ID token assertion, creating the account on
/// first login
pub async fn google_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.token.is_empty() {
        return Err(AuthFlowError::MissingToken.into());
    }

    let verifier = GoogleVerifier::new(state.http.clone());
    let profile = verifier
        .verify(&payload.token, state.google_client_id.as_deref())
        .await
        .map_err(|_| {
            // Which check failed is already in the logs; the caller only
            // learns that the assertion was refused
            warn!("Google assertion verification failed");
            AuthFlowError::AuthenticationFailed
        })?;

    let session = resolver::login_with_google(&state.db, profile)
        .await
        .map_err(ApiError::from)?;

    Ok(session_response(session))
}

/// GET /user
/// Session-backed identity fetch
///
/// `loggedIn: false` is the normal answer for absent or stale credentials,
/// not an error; a stale credential additionally gets its cookie cleared.
pub async fn current_user(identity: SessionIdentity) -> Result<Response, ApiError> {
    match identity {
        SessionIdentity::Missing => {
            Ok(Json(serde_json::json!({"loggedIn": false})).into_response())
        }
        SessionIdentity::Invalid => {
            debug!("Clearing stale session cookie");
            let clear = format!("{}=; Max-Age=0; HttpOnly; Path=/", SESSION_COOKIE);
            Ok((
                [(SET_COOKIE, clear)],
                Json(serde_json::json!({"loggedIn": false, "error": "Invalid token"})),
            )
                .into_response())
        }
        SessionIdentity::Active(user) => Ok(Json(serde_json::json!({
            "loggedIn": true,
            "user": UserInfo::from(&user),
        }))
        .into_response()),
    }
}

/// Shapes the successful-login envelope and sets the session cookie
fn session_response(session: AuthSession) -> Response {
    let cookie = format!(
        "{}={}; HttpOnly; Path=/",
        SESSION_COOKIE, session.credential
    );
    let body = serde_json::json!({
        "success": true,
        "token": session.credential,
        "user": UserInfo::from(&session.user),
    });

    ([(SET_COOKIE, cookie)], Json(body)).into_response()
}
