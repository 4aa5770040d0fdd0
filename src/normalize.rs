//! # Canonical Schema Normalizer
//!
//! Turns a raw partial document into a complete [`CanonicalProfile`]: key
//! resolution, type-correct defaults for every known field, and preservation
//! of unknown fields. Total over any input that carries an identity token;
//! the only failure mode is [`ProfileError::MissingIdentity`].
//!
//! Determinism matters here: all canonical documents are key-sorted and
//! default-filled regardless of which code path produced them, so two
//! independently produced snapshots of the same person can be compared
//! field-for-field during migration and in tests.

use crate::error::ProfileError;
use crate::model::{
    fields, AccessLevel, CanonicalProfile, CertificateEntry, Document, EventsPermission,
};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current instant as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Clean an inbound identity token: trim, and lower-case email-shaped
/// tokens. Opaque ids are left case-sensitive.
pub(crate) fn clean_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.contains('@') {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a partial document into the canonical shape.
///
/// The primary key prefers an explicit `id`; otherwise the email is used,
/// trimmed and lower-cased. Known fields absent from the input get their
/// type-correct default; fields the caller supplied that this crate does
/// not know about are kept and serialize after the known ones.
pub fn normalize(input: &Document) -> Result<CanonicalProfile, ProfileError> {
    let mut src = input.clone();

    let explicit_id = take_string(&mut src, fields::ID)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let email_in = take_string(&mut src, fields::EMAIL)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let id = explicit_id
        .or_else(|| email_in.clone())
        .ok_or(ProfileError::MissingIdentity)?;
    let email = email_in.unwrap_or_else(|| id.clone());

    let created_at = take_string(&mut src, "createdAt")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(now_rfc3339);

    let profile = CanonicalProfile {
        id,
        email,
        created_via: take_string(&mut src, "createdVia").unwrap_or_default(),
        created_at,
        name: take_string(&mut src, "name").unwrap_or_default(),
        nickname: take_string(&mut src, "nickname").unwrap_or_default(),
        rank: take_string(&mut src, "rank").unwrap_or_default(),
        national_id: take_string(&mut src, fields::NATIONAL_ID).filter(|s| !s.is_empty()),
        national_id_hash: take_string(&mut src, fields::NATIONAL_ID_HASH)
            .filter(|s| !s.is_empty()),
        gender: take_string(&mut src, "gender").unwrap_or_default(),
        ethnicity: take_string(&mut src, "ethnicity").unwrap_or_default(),
        birth_date: take_string(&mut src, "birthDate").unwrap_or_default(),
        whatsapp: take_string(&mut src, "whatsapp").unwrap_or_default(),
        emergency_contact: take_string(&mut src, "emergencyContact").unwrap_or_default(),
        address: take_string(&mut src, "address").unwrap_or_default(),
        address_number: take_string(&mut src, "addressNumber").unwrap_or_default(),
        training_location: take_string(&mut src, "trainingLocation").unwrap_or_default(),
        training_schedule: take_string(&mut src, "trainingSchedule").unwrap_or_default(),
        reference_teacher: take_string(&mut src, "referenceTeacher").unwrap_or_default(),
        group_join_date: take_string(&mut src, "groupJoinDate").unwrap_or_default(),
        access_level: take_parsed::<AccessLevel>(&mut src, "accessLevel").unwrap_or_default(),
        events_permission: take_parsed::<EventsPermission>(&mut src, "eventsPermission")
            .unwrap_or_default(),
        accepted_terms: take_bool(&mut src, "acceptedTerms").unwrap_or_default(),
        rank_verified: take_bool(&mut src, "rankVerified").unwrap_or_default(),
        certificate_timeline: take_parsed::<Vec<CertificateEntry>>(&mut src, "certificateTimeline")
            .unwrap_or_default(),
        extra: src.into_iter().collect(),
    };

    Ok(profile)
}

fn take_string(src: &mut Document, key: &str) -> Option<String> {
    match src.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        // Wrong-typed values are dropped rather than smeared into text fields.
        Some(_) | None => None,
    }
}

fn take_bool(src: &mut Document, key: &str) -> Option<bool> {
    match src.remove(key) {
        Some(Value::Bool(b)) => Some(b),
        Some(_) | None => None,
    }
}

fn take_parsed<T: serde::de::DeserializeOwned>(src: &mut Document, key: &str) -> Option<T> {
    let value = src.remove(key)?;
    serde_json::from_value(value).ok()
}
