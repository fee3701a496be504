//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User account database model
///
/// An account always has at least one of `password_hash` / `google_user_id`
/// set. The resolver never links both onto one row - a collision between the
/// two credential types is reported as a conflict instead.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    #[sqlx(rename = "userId")]
    pub user_id: String,
    pub email: String,
    #[sqlx(rename = "passwordHash")]
    pub password_hash: Option<String>,
    #[sqlx(rename = "googleUserId")]
    pub google_user_id: Option<String>,
    #[sqlx(rename = "emailVerified")]
    pub email_verified: bool,
    #[sqlx(rename = "firstName")]
    pub first_name: String,
    #[sqlx(rename = "lastName")]
    pub last_name: String,
}

/// Public account profile, safe to send to the client
#[derive(Serialize, Debug)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(rename = "emailVerified")]
    pub email_verified: bool,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Outcome of a successful credential flow: the resolved account plus the
/// `userId:token` composite credential the client presents from now on
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub credential: String,
}

// Request payloads. All fields default to empty so that an absent field gets
// the same field-specific validation message as an empty one, instead of a
// deserialization rejection.

/// Request body for POST /login
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for POST /register
#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default, rename = "firstName")]
    pub first_name: String,
    #[serde(default, rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for POST /google-login
#[derive(Deserialize, Debug)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub token: String,
}
