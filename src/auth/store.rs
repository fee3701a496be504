// src/auth/store.rs
//! Credential store: the only module issuing SQL against the `users` and
//! `logins` tables. Every access is a single-statement round trip - no
//! multi-statement transactions (see the uniqueness backstop note in
//! `common::migrations`).

use sqlx::SqlitePool;

use super::google::VerifiedProfile;
use super::models::User;

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Matches on federated subject OR email, first match wins. The OR is a
/// deliberate widen: it also surfaces a pre-existing local account whose
/// email collides with a fresh federated login, so the resolver can report
/// the conflict instead of creating a duplicate identity.
pub async fn find_user_by_subject_or_email(
    pool: &SqlitePool,
    subject: &str,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE googleUserId = ? OR email = ?")
        .bind(subject)
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_id(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE userId = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Inserts a local (password) account. `emailVerified` starts false - there
/// is no local verification flow.
pub async fn insert_local_user(
    pool: &SqlitePool,
    user: &User,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (userId, email, passwordHash, emailVerified, firstName, lastName)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&user.user_id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts a federated account from a verified provider profile, with no
/// password hash.
pub async fn insert_federated_user(
    pool: &SqlitePool,
    user_id: &str,
    profile: &VerifiedProfile,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (userId, email, googleUserId, emailVerified, firstName, lastName)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&profile.email)
    .bind(&profile.subject)
    .bind(profile.email_verified)
    .bind(&profile.given_name)
    .bind(&profile.family_name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_login(
    pool: &SqlitePool,
    user_id: &str,
    token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO logins (userId, token) VALUES (?, ?)")
        .bind(user_id)
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

/// Exact (userId, token) pair lookup for session validation
pub async fn login_exists(
    pool: &SqlitePool,
    user_id: &str,
    token: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT userId FROM logins WHERE userId = ? AND token = ?")
            .bind(user_id)
            .bind(token)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Detects a SQLite UNIQUE/PRIMARY KEY constraint violation on a specific
/// column, used to map the check-then-insert registration race onto a
/// conflict error instead of a generic store failure.
///
/// The column matters: a violation on `users.email` is the registration
/// race, while one on `users.userId` would be a generated-ID collision -
/// a different failure that must not masquerade as an email conflict.
pub fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            // SQLite spells both out as "UNIQUE constraint failed: <table>.<column>"
            // (codes 2067 SQLITE_CONSTRAINT_UNIQUE / 1555 SQLITE_CONSTRAINT_PRIMARYKEY)
            db.message()
                .contains(&format!("UNIQUE constraint failed: {}", column))
        }
        _ => false,
    }
}
