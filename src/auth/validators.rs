// src/auth/validators.rs
//! Syntactic validation for credential inputs

use regex::Regex;
use std::sync::OnceLock;

/// Minimum accepted password length. No complexity or breach-list checks.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Checks that an email has a local part, an `@`, and a domain containing
/// at least one `.` - deliberately shallow, real verification would need a
/// confirmation mail.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
    re.is_match(email)
}
