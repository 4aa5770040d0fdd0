//! # National Id Handling
//!
//! Digits-only normalization and salted one-way hashing of the sensitive
//! identifier. The raw value is only ever queried as a fallback; everywhere
//! else it travels as a salted SHA-256 hex digest so it never lands in
//! query logs or error messages.

use sha2::{Digest, Sha256};

/// Number of digits a valid national id carries.
pub const NATIONAL_ID_LEN: usize = 11;

/// Strip everything but ASCII digits.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Whether the normalized form is a plausible national id.
pub fn is_valid_digits(digits: &str) -> bool {
    digits.len() == NATIONAL_ID_LEN && digits.chars().all(|c| c.is_ascii_digit())
}

/// `SHA-256(digits + salt)` as lowercase hex.
pub fn salted_hash(digits: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(digits.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
