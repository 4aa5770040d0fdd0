mod support;

use rollbook::{
    AccessLevel, CertificateEntry, CertificateReview, DocumentStore, ProfileError, ReviewStatus,
};
use serde_json::json;
use support::{doc, rollbook};

#[tokio::test]
async fn merge_patches_field_by_field() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    book.create(doc(json!({
        "email": "a@b.com",
        "name": "X",
        "whatsapp": "111"
    })))
    .await?;

    let updated = book
        .update("a@b.com", doc(json!({ "whatsapp": "222" })))
        .await?;
    assert_eq!(updated.name, "X");
    assert_eq!(updated.whatsapp, "222");
    Ok(())
}

#[tokio::test]
async fn merge_cannot_change_the_identity_fields() -> anyhow::Result<()> {
    let (book, store) = rollbook();
    book.create(doc(json!({ "email": "a@b.com" }))).await?;

    let updated = book
        .update(
            "a@b.com",
            doc(json!({ "id": "evil", "email": "evil@x.com", "name": "X" })),
        )
        .await?;
    assert_eq!(updated.id, "a@b.com");
    assert_eq!(updated.email, "a@b.com");
    assert_eq!(updated.name, "X");
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn merge_heals_legacy_shapes_as_a_side_effect() -> anyhow::Result<()> {
    let (book, store) = rollbook();
    store.seed(doc(json!({ "id": "u123", "email": "a@b.com", "name": "X" })));

    let updated = book
        .update("a@b.com", doc(json!({ "nickname": "Zed" })))
        .await?;
    assert_eq!(updated.id, "a@b.com");
    assert_eq!(updated.name, "X");
    assert_eq!(updated.nickname, "Zed");

    // The legacy document was deleted on the way.
    assert!(store.read("u123").await?.is_none());
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn merge_starts_from_a_shell_on_miss() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    let created = book
        .update("new@b.com", doc(json!({ "name": "X" })))
        .await?;
    assert_eq!(created.id, "new@b.com");
    assert_eq!(created.name, "X");
    assert_eq!(created.access_level, AccessLevel::Visitor);
    Ok(())
}

#[tokio::test]
async fn merge_preserves_unknown_fields_across_updates() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    book.create(doc(json!({
        "email": "a@b.com",
        "questionnaires": { "q1": "yes" }
    })))
    .await?;

    let updated = book.update("a@b.com", doc(json!({ "name": "X" }))).await?;
    assert_eq!(
        updated.extra.get("questionnaires"),
        Some(&json!({ "q1": "yes" }))
    );
    Ok(())
}

#[tokio::test]
async fn certificate_review_approves_and_promotes() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    book.create(doc(json!({ "email": "a@b.com", "rank": "yellow" })))
        .await?;

    book.append_certificate(
        "a@b.com",
        CertificateEntry {
            id: "cert-1".into(),
            rank: "orange".into(),
            ..Default::default()
        },
    )
    .await?;

    let pending = book.pending_certificates().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].email, "a@b.com");
    assert_eq!(pending[0].entry.id, "cert-1");

    let profile = book
        .review_certificate(
            "a@b.com",
            "cert-1",
            CertificateReview {
                status: ReviewStatus::Approved,
                by: "reviewer@icmbc.example".into(),
                note: "checked against the event records".into(),
                promote_rank: true,
            },
        )
        .await?
        .expect("profile");

    assert_eq!(profile.rank, "orange");
    assert!(profile.rank_verified);
    let entry = &profile.certificate_timeline[0];
    assert_eq!(entry.status, ReviewStatus::Approved);
    let review = entry.review.as_ref().expect("review decision");
    assert_eq!(review.by, "reviewer@icmbc.example");
    assert!(!review.at.is_empty());

    assert!(book.pending_certificates().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rejection_keeps_the_current_rank() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    book.create(doc(json!({ "email": "a@b.com", "rank": "yellow" })))
        .await?;
    book.append_certificate(
        "a@b.com",
        CertificateEntry {
            id: "cert-1".into(),
            rank: "orange".into(),
            ..Default::default()
        },
    )
    .await?;

    let profile = book
        .review_certificate(
            "a@b.com",
            "cert-1",
            CertificateReview {
                status: ReviewStatus::Rejected,
                by: "reviewer@icmbc.example".into(),
                note: "certificate image unreadable".into(),
                promote_rank: true,
            },
        )
        .await?
        .expect("profile");

    assert_eq!(profile.rank, "yellow");
    assert!(!profile.rank_verified);
    assert_eq!(
        profile.certificate_timeline[0].status,
        ReviewStatus::Rejected
    );
    Ok(())
}

#[tokio::test]
async fn reviewing_an_unknown_certificate_is_an_error() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    book.create(doc(json!({ "email": "a@b.com" }))).await?;

    let err = book
        .review_certificate(
            "a@b.com",
            "missing",
            CertificateReview {
                status: ReviewStatus::Approved,
                by: "reviewer@icmbc.example".into(),
                note: String::new(),
                promote_rank: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::CertificateNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn reviewing_a_missing_profile_is_not_found() -> anyhow::Result<()> {
    let (book, _store) = rollbook();
    let outcome = book
        .review_certificate(
            "nobody@x.com",
            "cert-1",
            CertificateReview {
                status: ReviewStatus::Approved,
                by: "reviewer@icmbc.example".into(),
                note: String::new(),
                promote_rank: false,
            },
        )
        .await?;
    assert!(outcome.is_none());
    Ok(())
}

#[tokio::test]
async fn listing_shapes_legacy_documents_canonically() -> anyhow::Result<()> {
    let (book, store) = rollbook();
    book.create(doc(json!({ "email": "a@b.com", "name": "A" })))
        .await?;
    store.seed(doc(json!({ "id": "u123", "email": "b@b.com", "name": "B" })));

    let mut profiles = book.list_profiles().await?;
    profiles.sort_by(|a, b| a.email.cmp(&b.email));
    assert_eq!(profiles.len(), 2);
    // Listing shapes on the way out; it does not migrate.
    assert_eq!(profiles[1].id, "u123");
    assert_eq!(profiles[1].email, "b@b.com");
    assert_eq!(profiles[1].access_level, AccessLevel::Visitor);
    assert!(store.read("u123").await?.is_some());
    Ok(())
}
