// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Run all database migrations
///
/// Tables are created if they don't exist. Setting RESET_DB=true drops
/// everything first, for a clean local slate - never use in production.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("RESET_DB=true - Dropping all tables and recreating schema...");
        drop_all_tables(pool).await?;
        info!("Dropped old tables");
    }

    create_account_tables(pool).await?;
    create_indexes(pool).await?;

    info!("Database migration completed successfully");

    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS logins").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS users").execute(pool).await?;
    Ok(())
}

/// Create the user account and session token tables
///
/// The UNIQUE constraint on users.email is the real enforcement of email
/// uniqueness: the application-level "already registered" check can race
/// between concurrent requests, and the constraint is the backstop.
/// NOCASE keeps the constraint (and every email = ? lookup) case-insensitive,
/// so A@b.com and a@b.com are one identity.
async fn create_account_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            userId TEXT PRIMARY KEY,
            email TEXT NOT NULL COLLATE NOCASE UNIQUE,
            passwordHash TEXT,
            googleUserId TEXT,
            emailVerified INTEGER NOT NULL DEFAULT 0,
            firstName TEXT NOT NULL,
            lastName TEXT NOT NULL,
            createdAt TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Session token records: created on login, never updated or expired.
    // Many tokens may reference one account over time.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS logins (
            userId TEXT NOT NULL REFERENCES users(userId),
            token TEXT NOT NULL,
            createdAt TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (userId, token)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_google_user_id ON users(googleUserId)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logins_user_id ON logins(userId)")
        .execute(pool)
        .await?;

    Ok(())
}
