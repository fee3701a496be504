// src/auth/session.rs
//! Session manager: mints and validates opaque session credentials.
//!
//! A credential is `userId:token`. The token is 32 characters from a
//! 36-symbol lowercase-alphanumeric alphabet, drawn from `thread_rng`
//! (a CSPRNG). Tokens never expire; the absence of a matching record is the
//! "logged out" state, not an exceptional condition.
//!
//! This module only computes token values - persistence goes through the
//! credential store, which owns the `logins` table.

use rand::Rng;
use sqlx::SqlitePool;
use tracing::debug;

use super::store;
use crate::common::safe_token_log;

/// Lowercase-alphanumeric token alphabet
const TOKEN_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Session token length (~165 bits of entropy at 36 symbols)
pub const TOKEN_LEN: usize = 32;

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

/// Mints a fresh session token for an account, persists the record, and
/// returns the composite credential handed to the client
pub async fn mint_session(pool: &SqlitePool, user_id: &str) -> Result<String, sqlx::Error> {
    let token = generate_token();
    store::insert_login(pool, user_id, &token).await?;

    let credential = format!("{}:{}", user_id, token);
    debug!(
        user_id = %user_id,
        credential = %safe_token_log(&credential),
        "Minted session credential"
    );

    Ok(credential)
}

/// Resolves a composite credential back to its owning account id
///
/// Returns `Ok(None)` for anything that doesn't check out: wrong shape
/// (exactly one `:` separator required) or no stored (userId, token) pair.
pub async fn validate_session(
    pool: &SqlitePool,
    credential: &str,
) -> Result<Option<String>, sqlx::Error> {
    let parts: Vec<&str> = credential.split(':').collect();
    if parts.len() != 2 {
        return Ok(None);
    }

    let (user_id, token) = (parts[0], parts[1]);
    if store::login_exists(pool, user_id, token).await? {
        Ok(Some(user_id.to_string()))
    } else {
        Ok(None)
    }
}
