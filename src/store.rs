//! # Store Module
//!
//! The document-store seam: an object-safe async client trait covering the
//! four primitives this crate needs (point read, upsert, delete, conditional
//! query), plus an in-memory implementation with operation counters used by
//! tests and embedders.
//!
//! Every operation is an async I/O call; callers suspend, nothing blocks a
//! worker thread. There are no cross-partition transactions and no automatic
//! retries at this layer.

use crate::model::{fields, Document};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Transient store failures. Surfaced as-is; retry policy is a caller concern.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document store request timed out")]
    Timeout,

    /// A document without a usable string `id` reached a write.
    #[error("malformed document at key {key:?}")]
    Malformed { key: Option<String> },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Conditional query filter.
///
/// This is the subset of the managed store's query language the crate
/// actually issues; implementations translate it to their native form.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document. Admin listings only.
    All,
    /// Top-level field equals the value.
    Eq(&'static str, Value),
    /// Top-level array field contains the value.
    Contains(&'static str, Value),
    /// Any sub-filter matches.
    Any(Vec<Filter>),
}

impl Filter {
    /// Match a token against every historically valid identity field:
    /// document id, current email field, the opaque-id scheme's primary
    /// email, and membership of its email-history list.
    pub fn identity_token(token: &str) -> Self {
        Filter::Any(vec![
            Filter::Eq(fields::ID, token.into()),
            Filter::Eq(fields::EMAIL, token.into()),
            Filter::Eq(fields::PRIMARY_EMAIL, token.into()),
            Filter::Contains(fields::EMAILS, token.into()),
        ])
    }

    /// Evaluate against a document. Implementations backed by a real store
    /// push this down; the in-memory store evaluates it directly.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(*field) == Some(value),
            Filter::Contains(field, value) => doc
                .get(*field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::Any(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Abstract document-store client.
///
/// The container is shared process-wide; the only atomicity guarantee is the
/// store's per-document read/replace.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Single round-trip read by partition key. Not-found is `Ok(None)`.
    async fn read(&self, key: &str) -> StoreResult<Option<Document>>;

    /// Create-or-overwrite the document at its `id`, which is also the
    /// partition key. Returns the stored form.
    async fn upsert(&self, doc: Document) -> StoreResult<Document>;

    /// Delete by partition key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Cross-partition conditional query, bounded by `limit`.
    async fn query(&self, filter: &Filter, limit: usize) -> StoreResult<Vec<Document>>;
}

/// Operation counters for a [`MemoryStore`].
///
/// The idempotence tests assert on these: a converged reconciliation must
/// perform zero additional writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetrics {
    pub reads: u64,
    pub queries: u64,
    pub upserts: u64,
    pub deletes: u64,
}

impl StoreMetrics {
    /// Total mutating operations.
    pub fn writes(&self) -> u64 {
        self.upserts + self.deletes
    }
}

/// In-memory [`DocumentStore`] for tests and embedded use.
///
/// Documents are held in key order, so scans are deterministic. A
/// fault-injection switch makes every operation fail with
/// [`StoreError::Unavailable`] for failure-path tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Document>>,
    metrics: Mutex<StoreMetrics>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing normalization and metrics. Used
    /// to stage legacy shapes in tests.
    pub fn seed(&self, doc: Document) {
        if let Some(id) = doc.get(fields::ID).and_then(Value::as_str) {
            self.documents.lock().insert(id.to_string(), doc.clone());
        }
    }

    /// Snapshot of the operation counters.
    pub fn metrics(&self) -> StoreMetrics {
        *self.metrics.lock()
    }

    /// Toggle fault injection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("fault injection".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Document>> {
        self.check_available()?;
        self.metrics.lock().reads += 1;
        Ok(self.documents.lock().get(key).cloned())
    }

    async fn upsert(&self, doc: Document) -> StoreResult<Document> {
        self.check_available()?;
        let key = doc
            .get(fields::ID)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StoreError::Malformed { key: None })?;
        self.metrics.lock().upserts += 1;
        self.documents.lock().insert(key, doc.clone());
        Ok(doc)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.metrics.lock().deletes += 1;
        self.documents.lock().remove(key);
        Ok(())
    }

    async fn query(&self, filter: &Filter, limit: usize) -> StoreResult<Vec<Document>> {
        self.check_available()?;
        self.metrics.lock().queries += 1;
        Ok(self
            .documents
            .lock()
            .values()
            .filter(|doc| filter.matches(doc))
            .take(limit)
            .cloned()
            .collect())
    }
}
