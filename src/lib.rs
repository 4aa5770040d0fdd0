//! # Rollbook
//!
//! Canonical member-profile mastering for an association membership backend:
//! schema normalization, best-effort national-id uniqueness, and idempotent
//! identity reconciliation over a partitioned, schema-less document store
//! with no cross-partition transactions.
//!
//! This crate is the logical data-access layer only. HTTP routing, blob
//! storage, and OTP/JWT/OAuth flows are external collaborators; they call
//! [`Rollbook`] and map its typed results to user-facing responses.
//!
//! Coordination model: there is no in-process locking between operations.
//! Concurrent merges on the same identity race and the last write wins;
//! repeated reconciliation of one identity converges regardless of
//! interleaving. See `DESIGN.md` for the accepted-limitation notes.

pub mod config;
pub mod error;
pub mod model;
pub mod national_id;
pub mod normalize;
pub mod probe;
pub mod reconcile;
pub mod store;

pub use config::RollbookConfig;
pub use error::{ProfileError, Result};
pub use model::{
    AccessLevel, CanonicalProfile, CertificateEntry, Claimant, Document, EventsPermission,
    ReviewDecision, ReviewStatus,
};
pub use normalize::normalize;
pub use probe::UniquenessProbe;
pub use reconcile::{Reconciler, Resolution};
pub use store::{DocumentStore, Filter, MemoryStore, StoreError, StoreMetrics};

use crate::model::fields;
use crate::national_id::{is_valid_digits, normalize_digits, salted_hash};
use crate::normalize::{clean_token, now_rfc3339};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// A reviewer's verdict on a certificate-timeline entry.
#[derive(Debug, Clone)]
pub struct CertificateReview {
    /// `Approved` or `Rejected`; `Pending` is not a valid verdict.
    pub status: ReviewStatus,
    /// Reviewer identity recorded on the entry.
    pub by: String,
    pub note: String,
    /// On approval, set the profile's rank from the certificate and mark it
    /// verified.
    pub promote_rank: bool,
}

/// A certificate awaiting review, with enough context for an admin listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCertificate {
    pub email: String,
    pub name: String,
    pub entry: CertificateEntry,
}

/// Main API for profile mastering.
///
/// Owns the store handle and the national-id salt explicitly; no hidden
/// process-wide state.
pub struct Rollbook {
    store: Arc<dyn DocumentStore>,
    probe: UniquenessProbe,
    reconciler: Reconciler,
    config: RollbookConfig,
}

impl Rollbook {
    pub fn new(store: Arc<dyn DocumentStore>, config: RollbookConfig) -> Self {
        Self {
            probe: UniquenessProbe::new(Arc::clone(&store)),
            reconciler: Reconciler::new(Arc::clone(&store), config.scan_limit),
            store,
            config,
        }
    }

    /// The underlying reconciliation engine, for embedders that need the
    /// [`Resolution`] classification or the repair [`Reconciler::sweep`].
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Resolve an identity token to its canonical profile.
    ///
    /// Side effect: legacy shapes found on the way are migrated and their
    /// superseded duplicates deleted. `Ok(None)` means the profile does not
    /// exist yet.
    pub async fn lookup(&self, token: &str) -> Result<Option<CanonicalProfile>> {
        Ok(self.reconciler.resolve(token).await?.map(|(p, _)| p))
    }

    /// Create (or idempotently re-create) a canonical profile from a partial
    /// document. Used by registration and by "ensure a shell exists" flows
    /// such as first social login.
    ///
    /// A national id in the input is validated, hashed, and checked for an
    /// existing claimant before the write; store failures here fail closed.
    pub async fn create(&self, partial: Document) -> Result<CanonicalProfile> {
        let mut partial = partial;
        let token = identity_token_of(&partial).ok_or(ProfileError::MissingIdentity)?;
        self.absorb_national_id(&mut partial, &token).await?;

        let profile = normalize(&partial)?;
        self.store.upsert(profile.to_document()).await?;
        Ok(profile)
    }

    /// Merge a patch over the current canonical record and write it back.
    ///
    /// The current record is resolved through the reconciliation engine, so
    /// any update heals legacy shapes and may delete superseded duplicates
    /// as a side effect. On a miss the merge starts from an `{id, email}`
    /// shell. The patch cannot change the identity fields; `id` and `email`
    /// always remain the canonical token. Last write wins against a
    /// concurrent merge of the same identity.
    ///
    /// A national id in the patch re-runs the uniqueness probe before the
    /// write; a different existing claimant aborts with
    /// [`ProfileError::DuplicateClaim`] and the stored record is untouched.
    pub async fn update(&self, token: &str, patch: Document) -> Result<CanonicalProfile> {
        let token = clean_token(token);
        if token.is_empty() {
            return Err(ProfileError::MissingIdentity);
        }

        let mut patch = patch;
        self.absorb_national_id(&mut patch, &token).await?;

        let mut merged = match self.reconciler.resolve(&token).await? {
            Some((current, _)) => current.to_document(),
            None => shell_document(&token),
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }
        merged.insert(fields::ID.into(), Value::String(token.clone()));
        merged.insert(fields::EMAIL.into(), Value::String(token.clone()));

        let profile = normalize(&merged)?;
        self.store.upsert(profile.to_document()).await?;
        Ok(profile)
    }

    /// Pre-submit uniqueness check for a raw national id.
    ///
    /// Read-side check: invalid input reports no claimant, and a store
    /// failure fails open (logged, reported as no claimant) rather than
    /// blocking the caller's form flow.
    pub async fn check_unique(&self, raw: &str) -> Result<Option<Claimant>> {
        let digits = normalize_digits(raw);
        if !is_valid_digits(&digits) {
            return Ok(None);
        }
        let hash = salted_hash(&digits, &self.config.national_id_salt);
        match self.probe.claimant(Some(&hash), None).await {
            Ok(claimant) => Ok(claimant),
            Err(err) => {
                warn!(error = %err, "uniqueness probe unavailable; failing open");
                Ok(None)
            }
        }
    }

    /// Append an entry to the profile's certificate timeline, creating a
    /// canonical shell first if the profile does not exist yet.
    pub async fn append_certificate(
        &self,
        token: &str,
        entry: CertificateEntry,
    ) -> Result<CanonicalProfile> {
        let token = clean_token(token);
        if token.is_empty() {
            return Err(ProfileError::MissingIdentity);
        }

        let mut profile = match self.reconciler.resolve(&token).await? {
            Some((current, _)) => current,
            None => normalize(&shell_document(&token))?,
        };
        profile.certificate_timeline.push(entry);
        self.store.upsert(profile.to_document()).await?;
        Ok(profile)
    }

    /// Apply a review verdict to one certificate entry.
    ///
    /// `Ok(None)` when no profile exists for the token;
    /// [`ProfileError::CertificateNotFound`] when the entry id is unknown.
    pub async fn review_certificate(
        &self,
        token: &str,
        cert_id: &str,
        review: CertificateReview,
    ) -> Result<Option<CanonicalProfile>> {
        let Some((mut profile, _)) = self.reconciler.resolve(token).await? else {
            return Ok(None);
        };

        let entry = profile
            .certificate_timeline
            .iter_mut()
            .find(|entry| entry.id == cert_id)
            .ok_or_else(|| ProfileError::CertificateNotFound(cert_id.to_string()))?;

        entry.status = review.status;
        entry.review = Some(ReviewDecision {
            by: review.by,
            at: now_rfc3339(),
            note: review.note,
        });
        let approved_rank = (review.status == ReviewStatus::Approved && review.promote_rank)
            .then(|| entry.rank.clone());

        if let Some(rank) = approved_rank {
            profile.rank = rank;
            profile.rank_verified = true;
        }

        self.store.upsert(profile.to_document()).await?;
        Ok(Some(profile))
    }

    /// Admin listing of every certificate still pending review.
    pub async fn pending_certificates(&self) -> Result<Vec<PendingCertificate>> {
        let mut pending = Vec::new();
        for profile in self.list_profiles().await? {
            for entry in &profile.certificate_timeline {
                if entry.status == ReviewStatus::Pending {
                    pending.push(PendingCertificate {
                        email: profile.email.clone(),
                        name: profile.name.clone(),
                        entry: entry.clone(),
                    });
                }
            }
        }
        Ok(pending)
    }

    /// Admin full listing, shaped canonically on the way out. Documents
    /// without an identity token are skipped.
    pub async fn list_profiles(&self) -> Result<Vec<CanonicalProfile>> {
        let docs = self.store.query(&Filter::All, usize::MAX).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| normalize(doc).ok())
            .collect())
    }

    /// Validate, hash, and uniqueness-check a national id carried by a
    /// write. Write-side check: store failures fail closed.
    async fn absorb_national_id(&self, doc: &mut Document, self_token: &str) -> Result<()> {
        let Some(raw) = doc.get(fields::NATIONAL_ID).and_then(Value::as_str) else {
            return Ok(());
        };
        if raw.trim().is_empty() {
            doc.remove(fields::NATIONAL_ID);
            doc.remove(fields::NATIONAL_ID_HASH);
            return Ok(());
        }

        let digits = normalize_digits(raw);
        if !is_valid_digits(&digits) {
            return Err(ProfileError::InvalidNationalId);
        }
        let hash = salted_hash(&digits, &self.config.national_id_salt);

        if let Some(claimant) = self.probe.claimant(Some(&hash), None).await? {
            if claimant.email != self_token && claimant.id != self_token {
                return Err(ProfileError::DuplicateClaim { claimant });
            }
        }

        doc.insert(fields::NATIONAL_ID.into(), Value::String(digits));
        doc.insert(fields::NATIONAL_ID_HASH.into(), Value::String(hash));
        Ok(())
    }
}

fn identity_token_of(doc: &Document) -> Option<String> {
    let explicit = doc
        .get(fields::ID)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let email = doc
        .get(fields::EMAIL)
        .and_then(Value::as_str)
        .map(clean_token)
        .filter(|s| !s.is_empty());
    explicit.map(str::to_string).or(email)
}

fn shell_document(token: &str) -> Document {
    let mut doc = Document::new();
    doc.insert(fields::ID.into(), Value::String(token.into()));
    doc.insert(fields::EMAIL.into(), Value::String(token.into()));
    doc
}
