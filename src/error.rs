//! # Error Taxonomy
//!
//! Typed errors surfaced to the route layer. Not-found is a normal
//! `Ok(None)` outcome everywhere in this crate, never an error.

use crate::model::Claimant;
use crate::store::StoreError;
use thiserror::Error;

/// Errors produced by the profile mastering layer.
///
/// The raw national id never appears in any variant; conflicts carry only
/// the existing claimant's identity.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The input carried neither an email nor an id. Rejected before any I/O.
    #[error("profile input has no email or id")]
    MissingIdentity,

    /// The supplied national id is not an 11-digit number.
    #[error("national id must be exactly 11 digits")]
    InvalidNationalId,

    /// The national id is already claimed by a different canonical record.
    #[error("national id already claimed by {claimant}")]
    DuplicateClaim { claimant: Claimant },

    /// A certificate review referenced an entry that does not exist.
    #[error("certificate {0} not found in timeline")]
    CertificateNotFound(String),

    /// Transient store failure, surfaced as-is. Retry policy is a caller
    /// concern; nothing in this layer retries automatically.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProfileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_claim_never_exposes_raw_digits() {
        let err = ProfileError::DuplicateClaim {
            claimant: Claimant {
                id: "a@b.com".into(),
                email: "a@b.com".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("a@b.com"));
        assert!(msg.chars().filter(|c| c.is_ascii_digit()).count() < 11);
    }
}
