//! # Data Model
//!
//! Canonical profile shape and the supporting enums. Every component in the
//! crate except the reconciliation engine only ever sees [`CanonicalProfile`];
//! legacy document shapes exist solely as scan input to migration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A raw document as stored: a JSON object keyed by field name.
///
/// `serde_json`'s map is a `BTreeMap`, so document form is always
/// key-sorted. Two snapshots of the same person are therefore directly
/// comparable field-for-field, which migration and the tests rely on.
pub type Document = serde_json::Map<String, Value>;

/// Wire names of every field that has ever carried an identity token.
pub mod fields {
    pub const ID: &str = "id";
    pub const EMAIL: &str = "email";
    /// Opaque-id scheme: current address lives here.
    pub const PRIMARY_EMAIL: &str = "primaryEmail";
    /// Opaque-id scheme: every historical address.
    pub const EMAILS: &str = "emails";
    pub const NATIONAL_ID: &str = "nationalId";
    pub const NATIONAL_ID_HASH: &str = "nationalIdHash";
}

/// Ordered membership access levels, lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Visitor,
    Student,
    Graduate,
    Monitor,
    Instructor,
    Teacher,
    Elder,
}

impl AccessLevel {
    /// Levels that grant administrative roles in the embedding application.
    pub fn grants_admin(self) -> bool {
        matches!(self, Self::Instructor | Self::Teacher | Self::Elder)
    }
}

/// Permission flag for the events surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventsPermission {
    #[default]
    Reader,
    Editor,
}

/// Review state of a certificate-timeline entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Who reviewed a certificate, when, and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewDecision {
    pub by: String,
    pub at: String,
    pub note: String,
}

/// One entry in a profile's certificate timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateEntry {
    pub id: String,
    /// Rank claimed by the certificate.
    pub rank: String,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewDecision>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The record already holding a national id, as reported on a conflict.
///
/// Carries only identity, never the sensitive value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub id: String,
    pub email: String,
}

impl Claimant {
    /// Extract a claimant from a stored document, mirroring the store's
    /// `email || id` fallback for pre-email-keyed records.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let id = doc.get(fields::ID)?.as_str()?.to_string();
        let email = doc
            .get(fields::EMAIL)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        Some(Self { id, email })
    }
}

impl fmt::Display for Claimant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.email)
    }
}

/// The single authoritative record for a person, keyed by `id`, which is
/// also the partition key.
///
/// Every known field is always present after normalization; unknown fields
/// supplied by newer writers survive in `extra` and serialize after the
/// known ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanonicalProfile {
    pub id: String,
    pub email: String,
    /// Provenance of first creation, e.g. "google" or "registration".
    pub created_via: String,
    pub created_at: String,

    pub name: String,
    pub nickname: String,
    pub rank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id_hash: Option<String>,
    pub gender: String,
    pub ethnicity: String,
    pub birth_date: String,
    pub whatsapp: String,
    pub emergency_contact: String,
    pub address: String,
    pub address_number: String,
    pub training_location: String,
    pub training_schedule: String,
    pub reference_teacher: String,
    pub group_join_date: String,

    pub access_level: AccessLevel,
    pub events_permission: EventsPermission,
    pub accepted_terms: bool,
    pub rank_verified: bool,
    pub certificate_timeline: Vec<CertificateEntry>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CanonicalProfile {
    /// Serialize to stored-document form (key-sorted JSON object).
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        }
    }

    /// Parse a stored document back into the canonical shape.
    pub fn from_document(doc: &Document) -> Option<Self> {
        serde_json::from_value(Value::Object(doc.clone())).ok()
    }

    /// The claimant view of this profile.
    pub fn claimant(&self) -> Claimant {
        Claimant {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}
