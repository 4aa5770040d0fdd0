//! # Uniqueness Index Probe
//!
//! Best-effort secondary-uniqueness check for the salted national-id hash.
//! The store has no native secondary unique index and no cross-partition
//! transaction, so uniqueness is approximated by a scan: hash query first
//! (no raw PII in query logs), raw-digit query only when no hash was given.
//!
//! Known weakness: this is a check-then-act sequence with no atomic guard.
//! Two writers racing to claim the same id can both pass the probe before
//! either commits. The reconciliation engine's idempotent sweep is the
//! after-the-fact repair hook.

use crate::model::{fields, Claimant};
use crate::store::{DocumentStore, Filter, StoreResult};
use std::sync::Arc;
use tracing::debug;

/// Probes the store for an existing claimant of a national id.
pub struct UniquenessProbe {
    store: Arc<dyn DocumentStore>,
}

impl UniquenessProbe {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Return the first canonical record claiming the id, or `None`.
    ///
    /// Error policy is the caller's: read-side checks fail open, write-side
    /// checks fail closed.
    pub async fn claimant(
        &self,
        hash: Option<&str>,
        raw_digits: Option<&str>,
    ) -> StoreResult<Option<Claimant>> {
        if let Some(hash) = hash.filter(|h| !h.is_empty()) {
            let hits = self
                .store
                .query(&Filter::Eq(fields::NATIONAL_ID_HASH, hash.into()), 1)
                .await?;
            debug!(hits = hits.len(), "national-id hash probe");
            return Ok(hits.first().and_then(Claimant::from_document));
        }

        if let Some(digits) = raw_digits.filter(|d| !d.is_empty()) {
            let hits = self
                .store
                .query(&Filter::Eq(fields::NATIONAL_ID, digits.into()), 1)
                .await?;
            debug!(hits = hits.len(), "raw national-id probe");
            return Ok(hits.first().and_then(Claimant::from_document));
        }

        Ok(None)
    }
}
