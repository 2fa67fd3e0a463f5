//! Kernel over an on-disk SQLite database.

use std::sync::Arc;

use docseal::core::ActionType;
use docseal::store::{AuditQuery, SqliteStore};
use docseal::{
    ClientInfo, Institution, InstitutionId, Kernel, KernelConfig, KernelError, ManualClock,
    NewDocument, NewKey, VerificationOutcome,
};
use docseal_testkit::{KeyMaterial, DAY_MS, EPOCH};

fn kernel_at(path: &std::path::Path, clock: Arc<ManualClock>) -> anyhow::Result<Kernel<SqliteStore>> {
    let store = SqliteStore::open(path)?;
    Ok(Kernel::builder(Arc::new(store))
        .config(KernelConfig::default())
        .clock(clock)
        .build())
}

#[tokio::test]
async fn test_verification_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("docseal.db");
    let clock = Arc::new(ManualClock::new(EPOCH));
    let material = KeyMaterial::p256();

    let hash = {
        let kernel = kernel_at(&path, clock.clone())?;
        let institution = Institution {
            id: InstitutionId::new(),
            name: "École Normale Supérieure".into(),
            slug: "ens".into(),
        };
        kernel.upsert_institution(&institution).await?;

        let key = kernel
            .register_key(
                NewKey::new(
                    institution.id,
                    material.public_pem(),
                    material.algorithm(),
                    EPOCH + 30 * DAY_MS,
                ),
                "registrar",
            )
            .await?;
        let hash = docseal::DocumentHash::of_content(b"teaching licence");
        kernel
            .record_document(NewDocument {
                institution_id: institution.id,
                key_id: key.id,
                signature: material.sign(&hash),
                document_hash: hash.to_string(),
                signed_at: None,
            })
            .await?;
        hash
    };

    let kernel = kernel_at(&path, clock.clone())?;
    let client = ClientInfo::new("192.0.2.1", "integration");
    let result = kernel.verify(hash.as_str(), &client).await?;
    assert_eq!(result.outcome, VerificationOutcome::Authentic);
    assert!(result.certificate.is_some());

    clock.advance(31 * DAY_MS);
    let swept = kernel.sweep_keys().await?;
    assert_eq!(swept.expired.len(), 1);
    let result = kernel.verify(hash.as_str(), &client).await?;
    assert_eq!(result.outcome, VerificationOutcome::KeyExpired);

    let history = kernel
        .audit_history(&AuditQuery::action(ActionType::Verify))
        .await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event.details["result"], "KEY_EXPIRED");
    assert_eq!(history[1].event.details["result"], "AUTHENTIC");

    let stats = kernel.public_stats().await?;
    assert_eq!(stats.verifications, 2);
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.active_keys, 0);
    Ok(())
}

#[tokio::test]
async fn test_summary_failure_keeps_verify_audit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("docseal.db");
    let clock = Arc::new(ManualClock::new(EPOCH));
    let material = KeyMaterial::p256();
    let kernel = kernel_at(&path, clock)?;

    let institution = Institution {
        id: InstitutionId::new(),
        name: "Conservatoire de Lyon".into(),
        slug: "cnsmd-lyon".into(),
    };
    kernel.upsert_institution(&institution).await?;
    let key = kernel
        .register_key(
            NewKey::new(
                institution.id,
                material.public_pem(),
                material.algorithm(),
                EPOCH + 30 * DAY_MS,
            ),
            "registrar",
        )
        .await?;
    let hash = docseal::DocumentHash::of_content(b"diploma in composition");
    kernel
        .record_document(NewDocument {
            institution_id: institution.id,
            key_id: key.id,
            signature: material.sign(&hash),
            document_hash: hash.to_string(),
            signed_at: None,
        })
        .await?;

    // institution lookups fail from here on; keys and documents still load
    rusqlite::Connection::open(&path)?
        .execute_batch("ALTER TABLE institutions RENAME TO institutions_archived")?;

    let client = ClientInfo::new("192.0.2.7", "integration");
    let err = kernel.verify(hash.as_str(), &client).await.unwrap_err();
    assert!(matches!(err, KernelError::Store(_)), "{err}");

    let history = kernel
        .audit_history(&AuditQuery::action(ActionType::Verify))
        .await?;
    assert_eq!(history.len(), 1);
    assert!(history[0].event.success);
    assert_eq!(history[0].event.details["result"], "AUTHENTIC");
    assert_eq!(history[0].event.ip, "192.0.2.7");
    Ok(())
}
