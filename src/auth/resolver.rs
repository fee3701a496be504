// src/auth/resolver.rs
//! Account resolver: decides whether an incoming credential matches,
//! conflicts with, or should create an account, then asks the session
//! manager for a credential.
//!
//! Takes the pool as a plain parameter so every flow is testable against an
//! in-memory store. No state is carried between calls.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use super::google::VerifiedProfile;
use super::models::{AuthSession, RegisterRequest, User};
use super::password::{hash_password, verify_password};
use super::session::{mint_session, validate_session};
use super::store;
use super::validators::{is_valid_email, MIN_PASSWORD_LEN};
use crate::common::{generate_user_id, safe_email_log, ApiError};

/// Everything a credential flow can fail with. Display strings are the
/// exact user-facing messages.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Your email address cannot be left blank")]
    MissingEmail,
    #[error("Your password cannot be left blank")]
    MissingPassword,
    #[error("There is no account registered for that email")]
    NoAccountForEmail,
    #[error("Please sign in with Google")]
    UseFederatedLogin,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("A name is required")]
    MissingName,
    #[error("An email address is required")]
    MissingEmailField,
    #[error("A password is required")]
    MissingPasswordField,
    #[error("Your email address is invalid")]
    InvalidEmail,
    #[error("Your password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("You've already registered an account with that email")]
    EmailAlreadyRegistered,
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Please log in using your password")]
    UsePasswordLogin,
    #[error("Invalid User ID")]
    InvalidUser,
    #[error("An unexpected error occurred. Please try again")]
    Store(#[from] sqlx::Error),
    #[error("An unexpected error occurred. Please try again")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<AuthFlowError> for ApiError {
    fn from(err: AuthFlowError) -> Self {
        use AuthFlowError::*;
        let message = err.to_string();
        match err {
            MissingEmail | MissingPassword | MissingName | MissingEmailField
            | MissingPasswordField | InvalidEmail | PasswordTooShort | MissingToken => {
                ApiError::BadRequest(message)
            }
            NoAccountForEmail | InvalidPassword | AuthenticationFailed | InvalidUser => {
                ApiError::Unauthorized(message)
            }
            UseFederatedLogin | UsePasswordLogin | EmailAlreadyRegistered => {
                ApiError::Conflict(message)
            }
            Store(e) => ApiError::DatabaseError(e),
            Hash(e) => ApiError::InternalServer(e.to_string()),
        }
    }
}

/// Result of a session-backed identity check. Absence of a valid session is
/// the ordinary "logged out" state, never an error.
#[derive(Debug)]
pub enum SessionIdentity {
    /// No credential was presented
    Missing,
    /// A credential was presented but is malformed or unknown; the client
    /// should discard it
    Invalid,
    /// A valid session bound to an existing account
    Active(User),
}

/// Login-by-password flow
pub async fn login_with_password(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<AuthSession, AuthFlowError> {
    if email.is_empty() {
        return Err(AuthFlowError::MissingEmail);
    }
    if password.is_empty() {
        return Err(AuthFlowError::MissingPassword);
    }

    let user = store::find_user_by_email(pool, email)
        .await?
        .ok_or(AuthFlowError::NoAccountForEmail)?;

    // A hash-less account was created via Google; don't attempt a password
    // comparison against an absent hash
    let Some(hash) = user.password_hash.as_deref() else {
        debug!(
            email = %safe_email_log(email),
            "Password login attempted against federated-only account"
        );
        return Err(AuthFlowError::UseFederatedLogin);
    };

    if !verify_password(password, hash) {
        debug!(email = %safe_email_log(email), "Password mismatch");
        return Err(AuthFlowError::InvalidPassword);
    }

    let credential = mint_session(pool, &user.user_id).await?;

    info!(
        user_id = %user.user_id,
        email = %safe_email_log(&user.email),
        "User logged in with password"
    );

    Ok(AuthSession { user, credential })
}

/// Register-by-password flow
pub async fn register_with_password(
    pool: &SqlitePool,
    req: &RegisterRequest,
) -> Result<AuthSession, AuthFlowError> {
    if req.first_name.is_empty() || req.last_name.is_empty() {
        return Err(AuthFlowError::MissingName);
    }
    if req.email.is_empty() {
        return Err(AuthFlowError::MissingEmailField);
    }
    if req.password.is_empty() {
        return Err(AuthFlowError::MissingPasswordField);
    }
    if !is_valid_email(&req.email) {
        return Err(AuthFlowError::InvalidEmail);
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthFlowError::PasswordTooShort);
    }

    // Advisory pre-check so the caller gets a path-specific conflict message;
    // the UNIQUE(email) constraint below is the real enforcement
    if let Some(existing) = store::find_user_by_email(pool, &req.email).await? {
        if existing.google_user_id.is_some() {
            return Err(AuthFlowError::UseFederatedLogin);
        }
        return Err(AuthFlowError::EmailAlreadyRegistered);
    }

    let user = User {
        user_id: generate_user_id(),
        email: req.email.clone(),
        password_hash: Some(hash_password(&req.password)?),
        google_user_id: None,
        email_verified: false,
        first_name: req.first_name.clone(),
        last_name: req.last_name.clone(),
    };

    if let Err(e) = store::insert_local_user(pool, &user).await {
        return Err(register_insert_error(e));
    }

    let credential = mint_session(pool, &user.user_id).await?;

    info!(
        user_id = %user.user_id,
        email = %safe_email_log(&user.email),
        "New account registered with password"
    );

    Ok(AuthSession { user, credential })
}

/// Maps a failed registration insert onto the flow taxonomy
///
/// Two concurrent registrations can both pass the advisory pre-check; the
/// UNIQUE(email) constraint catches the loser of that race and is reported
/// as the same conflict the pre-check would have given. Any other
/// violation - a generated userId colliding with an existing row - is not a
/// registration conflict and stays a generic store failure.
pub(crate) fn register_insert_error(e: sqlx::Error) -> AuthFlowError {
    if store::is_unique_violation(&e, "users.email") {
        AuthFlowError::EmailAlreadyRegistered
    } else {
        e.into()
    }
}

/// Federated login flow; the caller has already verified the assertion
pub async fn login_with_google(
    pool: &SqlitePool,
    profile: VerifiedProfile,
) -> Result<AuthSession, AuthFlowError> {
    if let Some(user) =
        store::find_user_by_subject_or_email(pool, &profile.subject, &profile.email).await?
    {
        // Conflict detection, not auto-link: an account matched by email
        // whose subject differs (or is absent entirely) keeps its password
        // credential and the federated attempt is refused
        if user.google_user_id.as_deref() != Some(profile.subject.as_str()) {
            debug!(
                user_id = %user.user_id,
                email = %safe_email_log(&profile.email),
                "Federated login collides with an existing non-federated account"
            );
            return Err(AuthFlowError::UsePasswordLogin);
        }

        // Same federated account returning: every successful login mints a
        // fresh session, same as the password path
        let credential = mint_session(pool, &user.user_id).await?;

        info!(
            user_id = %user.user_id,
            email = %safe_email_log(&user.email),
            provider = "google",
            "Returning user logged in via Google"
        );

        return Ok(AuthSession { user, credential });
    }

    let user_id = generate_user_id();
    store::insert_federated_user(pool, &user_id, &profile).await?;

    let user = User {
        user_id: user_id.clone(),
        email: profile.email.clone(),
        password_hash: None,
        google_user_id: Some(profile.subject.clone()),
        email_verified: profile.email_verified,
        first_name: profile.given_name.clone(),
        last_name: profile.family_name.clone(),
    };

    let credential = mint_session(pool, &user_id).await?;

    info!(
        user_id = %user_id,
        email = %safe_email_log(&user.email),
        provider = "google",
        "New account created via Google"
    );

    Ok(AuthSession { user, credential })
}

/// Session-backed identity fetch
///
/// Fails only when a valid session points at an account row that no longer
/// exists, or on a store error; every other outcome is an ordinary
/// [`SessionIdentity`] state.
pub async fn fetch_identity(
    pool: &SqlitePool,
    credential: Option<&str>,
) -> Result<SessionIdentity, AuthFlowError> {
    let Some(credential) = credential else {
        return Ok(SessionIdentity::Missing);
    };

    let Some(user_id) = validate_session(pool, credential).await? else {
        return Ok(SessionIdentity::Invalid);
    };

    match store::find_user_by_id(pool, &user_id).await? {
        Some(user) => Ok(SessionIdentity::Active(user)),
        None => Err(AuthFlowError::InvalidUser),
    }
}
