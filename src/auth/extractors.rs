//! Session credential extractor for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::resolver::{self, SessionIdentity};
use crate::common::{safe_token_log, ApiError, AppState};

/// Name of the cookie carrying the composite session credential
pub const SESSION_COOKIE: &str = "token";

/// Extracts and resolves the session credential from the `token` cookie,
/// falling back to the Authorization header.
///
/// This extractor never rejects just because the caller is logged out:
/// absent and invalid credentials are ordinary [`SessionIdentity`] values so
/// handlers can answer `loggedIn: false` instead of an error. Only store
/// failures and sessions pointing at a deleted account become rejections.
#[async_trait]
impl<S> FromRequestParts<S> for SessionIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        let credential = session_credential(&parts.headers);
        if let Some(c) = &credential {
            debug!(credential = %safe_token_log(c), "Resolving presented session credential");
        }

        let identity = resolver::fetch_identity(&app_state.db, credential.as_deref()).await?;
        Ok(identity)
    }
}

/// Pulls the composite credential out of the request headers
fn session_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = cookie_value(headers, SESSION_COOKIE) {
        return Some(value);
    }

    // Header fallback for clients that don't hold cookies
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let bare = auth.strip_prefix("Bearer ").unwrap_or(auth);
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
