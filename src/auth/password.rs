// src/auth/password.rs
//! Password credential manager
//!
//! bcrypt with a fixed work factor. The hash output is self-describing
//! (embeds salt and cost), so verification needs no side-channel and old
//! hashes keep verifying if the cost constant ever changes.

use tracing::warn;

/// Fixed bcrypt work factor for newly hashed passwords
pub const BCRYPT_COST: u32 = 10;

/// One-way salted hash of a plaintext password
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verifies a plaintext password against a stored bcrypt hash
///
/// Never errors: a malformed or non-bcrypt hash string verifies as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matched) => matched,
        Err(e) => {
            warn!(error = %e, "Stored password hash failed to parse during verification");
            false
        }
    }
}
