//! # Identity Reconciliation Engine
//!
//! Resolves a human-supplied identity token against documents written under
//! different historical id schemes, migrates the authoritative one to
//! canonical form, and deletes superseded duplicates.
//!
//! The engine is re-entrant and self-healing rather than transactional: a
//! partial failure after the heal-write but before the deletes leaves a
//! transient duplicate which the next invocation detects and removes.
//! Running the engine twice with no intervening writes returns the identical
//! canonical record and performs zero additional writes.

use crate::error::{ProfileError, Result};
use crate::model::{fields, CanonicalProfile, Document};
use crate::normalize::{clean_token, normalize};
use crate::store::{DocumentStore, Filter, StoreError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The point lookup hit the canonical document. No further work.
    FastHit,
    /// Nothing matches the token; the profile does not exist yet.
    Miss,
    /// The broad scan found the canonical document; `removed` superseded
    /// duplicates were deleted opportunistically.
    CanonicalHit { removed: usize },
    /// Only legacy shapes matched. One candidate was migrated to canonical
    /// form and `removed` leftovers were deleted.
    Migrated { candidates: usize, removed: usize },
}

/// The reconciliation engine. Everything outside this type only ever sees
/// the canonical shape; legacy documents are transient scan input here.
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    scan_limit: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>, scan_limit: usize) -> Self {
        Self { store, scan_limit }
    }

    /// Resolve a token to its canonical record, healing legacy shapes and
    /// deleting duplicates on the way.
    #[instrument(skip(self))]
    pub async fn resolve(&self, token: &str) -> Result<Option<(CanonicalProfile, Resolution)>> {
        let token = clean_token(token);
        if token.is_empty() {
            return Err(ProfileError::MissingIdentity);
        }

        // Fast path: the canonical document lives at the token key.
        if let Some(doc) = self.store.read(&token).await? {
            let profile = parse_canonical(&token, &doc)?;
            debug!("fast hit");
            return Ok(Some((profile, Resolution::FastHit)));
        }

        self.scan_and_heal(&token).await
    }

    /// Repair sweep: skip the fast path and run the broad scan even when a
    /// canonical document exists, so duplicates left behind by a partial
    /// failure or a lost uniqueness race get collapsed.
    #[instrument(skip(self))]
    pub async fn sweep(&self, token: &str) -> Result<Option<(CanonicalProfile, Resolution)>> {
        let token = clean_token(token);
        if token.is_empty() {
            return Err(ProfileError::MissingIdentity);
        }
        self.scan_and_heal(&token).await
    }

    /// Slow path: one broad scan across every historical identity field,
    /// then heal whatever it found.
    async fn scan_and_heal(&self, token: &str) -> Result<Option<(CanonicalProfile, Resolution)>> {
        let matches = self
            .store
            .query(&Filter::identity_token(token), self.scan_limit)
            .await?;
        if matches.is_empty() {
            debug!("miss");
            return Ok(None);
        }

        if let Some(canonical) = matches.iter().find(|doc| doc_id(doc) == Some(token)) {
            let profile = parse_canonical(token, canonical)?;
            let removed = self.delete_superseded(token, &matches).await?;
            debug!(removed, "canonical hit via scan");
            return Ok(Some((profile, Resolution::CanonicalHit { removed })));
        }

        // All matches are legacy-shaped. The documents are assumed to
        // represent the same person; when more than one could plausibly
        // match, the first in scan order wins (ambiguous policy, see
        // DESIGN.md).
        let candidates = matches.len();
        if candidates > 1 {
            warn!(
                candidates,
                "multiple legacy documents matched; taking the first in scan order"
            );
        }
        let healed = self.migrate(token, &matches[0]).await?;
        let removed = self.delete_superseded(token, &matches).await?;
        debug!(candidates, removed, "migrated legacy document");
        Ok(Some((healed, Resolution::Migrated { candidates, removed })))
    }

    /// Normalize a legacy candidate with its identity forced to the token
    /// and write it back at the canonical key.
    async fn migrate(&self, token: &str, candidate: &Document) -> Result<CanonicalProfile> {
        let mut input = candidate.clone();
        input.insert(fields::ID.into(), Value::String(token.into()));
        input.insert(fields::EMAIL.into(), Value::String(token.into()));
        let profile = normalize(&input)?;
        self.store.upsert(profile.to_document()).await?;
        Ok(profile)
    }

    /// Delete every scan result whose id differs from the canonical token.
    async fn delete_superseded(&self, token: &str, matches: &[Document]) -> Result<usize> {
        let mut removed = 0;
        for doc in matches {
            match doc_id(doc) {
                Some(id) if id != token => {
                    self.store.delete(id).await?;
                    removed += 1;
                }
                _ => {}
            }
        }
        Ok(removed)
    }
}

fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(fields::ID).and_then(Value::as_str)
}

fn parse_canonical(key: &str, doc: &Document) -> Result<CanonicalProfile> {
    CanonicalProfile::from_document(doc).ok_or_else(|| {
        ProfileError::Store(StoreError::Malformed {
            key: Some(key.to_string()),
        })
    })
}
