// src/auth/google.rs
//! Federated identity verifier for Google ID tokens
//!
//! Validation is delegated to Google's tokeninfo endpoint
//! (https://developers.google.com/identity/sign-in/web/backend-auth), which
//! checks the token signature against Google's current signing keys - key
//! rotation is therefore transparent to this service. Expiry and audience
//! are re-checked locally from the returned claims.
//!
//! Every failure collapses into the single opaque [`GoogleVerifyError`].
//! The specific reason is logged server-side but never returned to the
//! caller, so a forged token reveals nothing about which check it failed.

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::safe_email_log;

/// Opaque federated verification failure
#[derive(Debug, Error)]
#[error("Authentication failed")]
pub struct GoogleVerifyError;

/// Profile asserted by Google for a verified ID token
#[derive(Debug, Clone)]
pub struct VerifiedProfile {
    /// Stable Google subject identifier (`sub` claim)
    pub subject: String,
    pub email: String,
    /// Whether Google asserts ownership of the email was verified
    pub email_verified: bool,
    pub given_name: String,
    pub family_name: String,
}

/// Verifies Google ID token assertions against the tokeninfo endpoint
pub struct GoogleVerifier {
    http: Client,
}

impl GoogleVerifier {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Validates an ID token assertion and extracts the asserted profile
    pub async fn verify(
        &self,
        id_token: &str,
        expected_audience: Option<&str>,
    ) -> Result<VerifiedProfile, GoogleVerifyError> {
        let tokeninfo_url = format!(
            "https://oauth2.googleapis.com/tokeninfo?id_token={}",
            id_token
        );

        debug!("Initiating Google token validation with tokeninfo endpoint");

        let resp = self.http.get(&tokeninfo_url).send().await.map_err(|e| {
            warn!(
                error = %e,
                endpoint = "https://oauth2.googleapis.com/tokeninfo",
                "HTTP error contacting Google tokeninfo endpoint"
            );
            GoogleVerifyError
        })?;

        let status = resp.status();
        if !status.is_success() {
            // tokeninfo refuses tokens it cannot validate; don't distinguish why
            warn!(http_status = %status, "Google tokeninfo rejected the assertion");
            return Err(GoogleVerifyError);
        }

        let claims: Value = resp.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Google tokeninfo response");
            GoogleVerifyError
        })?;

        profile_from_claims(&claims, expected_audience, Utc::now().timestamp())
    }
}

/// Interprets tokeninfo claims into a [`VerifiedProfile`]
///
/// Factored out of the network call so the expiry/audience/field checks are
/// testable in isolation. tokeninfo serializes some claims as strings
/// ("email_verified": "true", "exp": "1353604926"), so both representations
/// are accepted.
pub(crate) fn profile_from_claims(
    claims: &Value,
    expected_audience: Option<&str>,
    now: i64,
) -> Result<VerifiedProfile, GoogleVerifyError> {
    let subject = claims.get("sub").and_then(Value::as_str);
    let email = claims.get("email").and_then(Value::as_str);

    let (Some(subject), Some(email)) = (subject, email) else {
        warn!(
            has_email = email.is_some(),
            has_sub = subject.is_some(),
            "Google token missing required fields (email/sub)"
        );
        return Err(GoogleVerifyError);
    };

    match claim_i64(claims, "exp") {
        Some(exp) if exp < now => {
            warn!(token_exp = exp, current_time = now, "Google token has expired");
            return Err(GoogleVerifyError);
        }
        Some(_) => {}
        None => {
            warn!("Google token missing expiry claim");
            return Err(GoogleVerifyError);
        }
    }

    if let Some(client_id) = expected_audience {
        match claims.get("aud").and_then(Value::as_str) {
            Some(aud) if aud == client_id => {}
            Some(aud) => {
                warn!(
                    token_audience = %aud,
                    expected_client_id = %client_id,
                    "Google token audience validation failed"
                );
                return Err(GoogleVerifyError);
            }
            None => {
                warn!(expected_client_id = %client_id, "Google token missing audience field");
                return Err(GoogleVerifyError);
            }
        }
    }

    let email_verified = claim_bool(claims, "email_verified").unwrap_or(false);
    let given_name = claims
        .get("given_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let family_name = claims
        .get("family_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    debug!(
        email = %safe_email_log(email),
        provider = "google",
        provider_id = %subject,
        "Google token validation successful"
    );

    Ok(VerifiedProfile {
        subject: subject.to_string(),
        email: email.to_string(),
        email_verified,
        given_name,
        family_name,
    })
}

fn claim_bool(claims: &Value, key: &str) -> Option<bool> {
    match claims.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s == "true"),
        _ => None,
    }
}

fn claim_i64(claims: &Value, key: &str) -> Option<i64> {
    match claims.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
