//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for DocSeal. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use docseal_core::{
    ActionType, Algorithm, AuditEvent, AuditId, AuditRecord, CryptographicKey, DocumentHash,
    DocumentId, DocumentStatus, Fingerprint, Institution, InstitutionId, KeyId, KeyRotation,
    KeyStatus, KeyValidation, ReportId, ReportStatus, ReportType, ReporterContact, ResourceType,
    RotationId, RotationType, SignedDocument, SuspiciousReport,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AuditQuery, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection from a worker thread.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

const KEY_COLUMNS: &str = "key_id, institution_id, public_key, fingerprint, algorithm, key_size,
     status, created_at, expires_at, revoked_at, revocation_reason, parent_key_id,
     validated_by, validated_at, metadata";

const DOCUMENT_COLUMNS: &str = "document_id, institution_id, key_id, document_hash, signature,
     status, signed_at, revoked_at, revocation_reason";

const REPORT_COLUMNS: &str = "report_id, document_id, document_hash, report_type, reason, status,
     reporter_email, reporter_name, created_at";

const AUDIT_COLUMNS: &str = "audit_id, actor, action_type, resource_type, resource_id, ip,
     user_agent, success, details, timestamp";

fn conversion<E>(ty: Type) -> impl FnOnce(E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| rusqlite::Error::FromSqlConversionFailure(0, ty, Box::new(e))
}

fn uuid_col(row: &Row<'_>, col: &str) -> rusqlite::Result<Uuid> {
    let bytes: Vec<u8> = row.get(col)?;
    Uuid::from_slice(&bytes).map_err(conversion(Type::Blob))
}

fn opt_uuid_col(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<Uuid>> {
    let bytes: Option<Vec<u8>> = row.get(col)?;
    bytes
        .map(|b| Uuid::from_slice(&b).map_err(conversion(Type::Blob)))
        .transpose()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn row_to_institution(row: &Row<'_>) -> rusqlite::Result<Institution> {
    Ok(Institution {
        id: InstitutionId::from_uuid(uuid_col(row, "institution_id")?),
        name: row.get("name")?,
        slug: row.get("slug")?,
    })
}

fn row_to_key(row: &Row<'_>) -> rusqlite::Result<CryptographicKey> {
    let public_key: Vec<u8> = row.get("public_key")?;
    let fingerprint: Vec<u8> = row.get("fingerprint")?;
    let algorithm: String = row.get("algorithm")?;
    let status: String = row.get("status")?;
    let metadata: String = row.get("metadata")?;

    Ok(CryptographicKey {
        id: KeyId::from_uuid(uuid_col(row, "key_id")?),
        institution_id: InstitutionId::from_uuid(uuid_col(row, "institution_id")?),
        public_key: Bytes::from(public_key),
        fingerprint: Fingerprint::try_from(fingerprint.as_slice())
            .map_err(conversion(Type::Blob))?,
        algorithm: Algorithm::parse(&algorithm).map_err(conversion(Type::Text))?,
        key_size: row.get("key_size")?,
        status: KeyStatus::parse(&status).map_err(conversion(Type::Text))?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        revoked_at: row.get("revoked_at")?,
        revocation_reason: row.get("revocation_reason")?,
        parent_key: opt_uuid_col(row, "parent_key_id")?.map(KeyId::from_uuid),
        validation: KeyValidation {
            validated_by: row.get("validated_by")?,
            validated_at: row.get("validated_at")?,
            metadata: serde_json::from_str(&metadata).map_err(conversion(Type::Text))?,
        },
    })
}

fn row_to_rotation(row: &Row<'_>) -> rusqlite::Result<KeyRotation> {
    let rotation_type: String = row.get("rotation_type")?;
    Ok(KeyRotation {
        id: RotationId::from_uuid(uuid_col(row, "rotation_id")?),
        old_key: KeyId::from_uuid(uuid_col(row, "old_key_id")?),
        new_key: KeyId::from_uuid(uuid_col(row, "new_key_id")?),
        rotation_type: RotationType::parse(&rotation_type).map_err(conversion(Type::Text))?,
        reason: row.get("reason")?,
        actor: row.get("actor")?,
        timestamp: row.get("timestamp")?,
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<SignedDocument> {
    let hash: String = row.get("document_hash")?;
    let signature: Vec<u8> = row.get("signature")?;
    let status: String = row.get("status")?;

    Ok(SignedDocument {
        id: DocumentId::from_uuid(uuid_col(row, "document_id")?),
        institution_id: InstitutionId::from_uuid(uuid_col(row, "institution_id")?),
        key_id: KeyId::from_uuid(uuid_col(row, "key_id")?),
        document_hash: DocumentHash::parse(&hash).map_err(conversion(Type::Text))?,
        signature: Bytes::from(signature),
        status: DocumentStatus::parse(&status).map_err(conversion(Type::Text))?,
        signed_at: row.get("signed_at")?,
        revoked_at: row.get("revoked_at")?,
        revocation_reason: row.get("revocation_reason")?,
    })
}

fn row_to_report(row: &Row<'_>) -> rusqlite::Result<SuspiciousReport> {
    let hash: String = row.get("document_hash")?;
    let report_type: String = row.get("report_type")?;
    let status: String = row.get("status")?;

    Ok(SuspiciousReport {
        id: ReportId::from_uuid(uuid_col(row, "report_id")?),
        document_id: opt_uuid_col(row, "document_id")?.map(DocumentId::from_uuid),
        document_hash: DocumentHash::parse(&hash).map_err(conversion(Type::Text))?,
        report_type: ReportType::parse(&report_type).map_err(conversion(Type::Text))?,
        reason: row.get("reason")?,
        status: ReportStatus::parse(&status).map_err(conversion(Type::Text))?,
        reporter: ReporterContact {
            email: row.get("reporter_email")?,
            name: row.get("reporter_name")?,
        },
        created_at: row.get("created_at")?,
    })
}

fn row_to_audit(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let action_type: String = row.get("action_type")?;
    let resource_type: String = row.get("resource_type")?;
    let details: String = row.get("details")?;

    Ok(AuditRecord {
        id: AuditId::from_uuid(uuid_col(row, "audit_id")?),
        event: AuditEvent {
            actor: row.get("actor")?,
            action_type: ActionType::parse(&action_type).map_err(conversion(Type::Text))?,
            resource_type: ResourceType::parse(&resource_type)
                .map_err(conversion(Type::Text))?,
            resource_id: row.get("resource_id")?,
            ip: row.get("ip")?,
            user_agent: row.get("user_agent")?,
            success: row.get("success")?,
            details: serde_json::from_str(&details).map_err(conversion(Type::Text))?,
        },
        timestamp: row.get("timestamp")?,
    })
}

fn load_key(conn: &Connection, id: &KeyId) -> Result<Option<CryptographicKey>> {
    conn.query_row(
        &format!("SELECT {KEY_COLUMNS} FROM cryptographic_keys WHERE key_id = ?1"),
        params![id.as_bytes().as_slice()],
        row_to_key,
    )
    .optional()
    .map_err(StoreError::from)
}

fn insert_key_row(conn: &Connection, key: &CryptographicKey) -> Result<()> {
    let metadata = serde_json::to_string(&key.validation.metadata)?;

    conn.execute(
        &format!(
            "INSERT INTO cryptographic_keys ({KEY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            key.id.as_bytes().as_slice(),
            key.institution_id.as_bytes().as_slice(),
            key.public_key.as_ref(),
            key.fingerprint.as_bytes().as_slice(),
            key.algorithm.as_str(),
            key.key_size,
            key.status.as_str(),
            key.created_at,
            key.expires_at,
            key.revoked_at,
            key.revocation_reason,
            key.parent_key.as_ref().map(|k| k.as_bytes().to_vec()),
            key.validation.validated_by,
            key.validation.validated_at,
            metadata,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateFingerprint(key.fingerprint.to_hex())
        } else {
            StoreError::from(e)
        }
    })?;

    Ok(())
}

fn update_key_status(conn: &Connection, key: &CryptographicKey) -> Result<()> {
    conn.execute(
        "UPDATE cryptographic_keys
         SET status = ?2, revoked_at = ?3, revocation_reason = ?4
         WHERE key_id = ?1",
        params![
            key.id.as_bytes().as_slice(),
            key.status.as_str(),
            key.revoked_at,
            key.revocation_reason,
        ],
    )?;
    Ok(())
}

fn load_document(conn: &Connection, id: &DocumentId) -> Result<Option<SignedDocument>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM signed_documents WHERE document_id = ?1"),
        params![id.as_bytes().as_slice()],
        row_to_document,
    )
    .optional()
    .map_err(StoreError::from)
}

fn load_report(conn: &Connection, id: &ReportId) -> Result<Option<SuspiciousReport>> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM suspicious_reports WHERE report_id = ?1"),
        params![id.as_bytes().as_slice()],
        row_to_report,
    )
    .optional()
    .map_err(StoreError::from)
}

fn collect_key_ids(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<KeyId>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(args, |row| {
            Ok(KeyId::from_uuid(uuid_col(row, "key_id")?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

fn count(conn: &Connection, sql: &str, param: Option<&str>) -> Result<u64> {
    let n: i64 = match param {
        Some(p) => conn.query_row(sql, params![p], |row| row.get(0))?,
        None => conn.query_row(sql, [], |row| row.get(0))?,
    };
    Ok(n as u64)
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_institution(&self, institution: &Institution) -> Result<()> {
        let institution = institution.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO institutions (institution_id, name, slug) VALUES (?1, ?2, ?3)
                 ON CONFLICT(institution_id) DO UPDATE SET name = excluded.name, slug = excluded.slug",
                params![
                    institution.id.as_bytes().as_slice(),
                    institution.name,
                    institution.slug,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateSlug(institution.slug.clone())
                } else {
                    StoreError::from(e)
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn get_institution(&self, id: &InstitutionId) -> Result<Option<Institution>> {
        let id = *id;

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT institution_id, name, slug FROM institutions WHERE institution_id = ?1",
                params![id.as_bytes().as_slice()],
                row_to_institution,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_key(&self, key: &CryptographicKey) -> Result<()> {
        let key = key.clone();
        self.blocking(move |conn| insert_key_row(conn, &key)).await
    }

    async fn get_key(&self, id: &KeyId) -> Result<Option<CryptographicKey>> {
        let id = *id;
        self.blocking(move |conn| load_key(conn, &id)).await
    }

    async fn get_key_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CryptographicKey>> {
        let fingerprint = *fingerprint;

        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {KEY_COLUMNS} FROM cryptographic_keys WHERE fingerprint = ?1"),
                params![fingerprint.as_bytes().as_slice()],
                row_to_key,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_keys(&self, institution: &InstitutionId) -> Result<Vec<CryptographicKey>> {
        let institution = *institution;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {KEY_COLUMNS} FROM cryptographic_keys
                 WHERE institution_id = ?1 ORDER BY created_at, rowid"
            ))?;
            let keys = stmt
                .query_map(params![institution.as_bytes().as_slice()], row_to_key)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
        .await
    }

    async fn transition_key(
        &self,
        id: &KeyId,
        to: KeyStatus,
        at: i64,
        reason: Option<&str>,
    ) -> Result<CryptographicKey> {
        let id = *id;
        let reason = reason.map(str::to_string);

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut key =
                load_key(&tx, &id)?.ok_or_else(|| StoreError::NotFound(format!("key {}", id)))?;
            key.transition(to, at, reason.as_deref())?;
            update_key_status(&tx, &key)?;

            tx.commit()?;
            Ok(key)
        })
        .await
    }

    async fn rotate_key(
        &self,
        old: &KeyId,
        new_key: &CryptographicKey,
        rotation: &KeyRotation,
    ) -> Result<()> {
        let old = *old;
        let new_key = new_key.clone();
        let rotation = rotation.clone();

        self.blocking(move |conn| {
            // Dropping the transaction on any early return rolls everything back.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut old_key = load_key(&tx, &old)?
                .ok_or_else(|| StoreError::NotFound(format!("key {}", old)))?;
            old_key.transition(KeyStatus::Rotated, rotation.timestamp, None)?;

            insert_key_row(&tx, &new_key)?;
            update_key_status(&tx, &old_key)?;
            tx.execute(
                "INSERT INTO key_rotations (rotation_id, old_key_id, new_key_id, rotation_type,
                                            reason, actor, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rotation.id.as_bytes().as_slice(),
                    rotation.old_key.as_bytes().as_slice(),
                    rotation.new_key.as_bytes().as_slice(),
                    rotation.rotation_type.as_str(),
                    rotation.reason,
                    rotation.actor,
                    rotation.timestamp,
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn expire_keys(&self, now: i64) -> Result<Vec<KeyId>> {
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let ids = collect_key_ids(
                &tx,
                "SELECT key_id FROM cryptographic_keys
                 WHERE status IN ('ACTIVE', 'EXPIRING_SOON') AND expires_at <= ?1
                 ORDER BY expires_at, rowid",
                params![now],
            )?;
            tx.execute(
                "UPDATE cryptographic_keys SET status = 'EXPIRED'
                 WHERE status IN ('ACTIVE', 'EXPIRING_SOON') AND expires_at <= ?1",
                params![now],
            )?;

            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn mark_expiring(&self, now: i64, window_ms: i64) -> Result<Vec<KeyId>> {
        let until = now.saturating_add(window_ms);

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let ids = collect_key_ids(
                &tx,
                "SELECT key_id FROM cryptographic_keys
                 WHERE status = 'ACTIVE' AND expires_at > ?1 AND expires_at <= ?2
                 ORDER BY expires_at, rowid",
                params![now, until],
            )?;
            tx.execute(
                "UPDATE cryptographic_keys SET status = 'EXPIRING_SOON'
                 WHERE status = 'ACTIVE' AND expires_at > ?1 AND expires_at <= ?2",
                params![now, until],
            )?;

            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn list_rotations(&self, key: &KeyId) -> Result<Vec<KeyRotation>> {
        let key = *key;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT rotation_id, old_key_id, new_key_id, rotation_type, reason, actor, timestamp
                 FROM key_rotations
                 WHERE old_key_id = ?1 OR new_key_id = ?1
                 ORDER BY timestamp, rowid",
            )?;
            let rotations = stmt
                .query_map(params![key.as_bytes().as_slice()], row_to_rotation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rotations)
        })
        .await
    }

    async fn count_keys(&self, status: KeyStatus) -> Result<u64> {
        self.blocking(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM cryptographic_keys WHERE status = ?1",
                Some(status.as_str()),
            )
        })
        .await
    }

    async fn insert_document(&self, document: &SignedDocument) -> Result<()> {
        let document = document.clone();

        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO signed_documents ({DOCUMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    document.id.as_bytes().as_slice(),
                    document.institution_id.as_bytes().as_slice(),
                    document.key_id.as_bytes().as_slice(),
                    document.document_hash.as_str(),
                    document.signature.as_ref(),
                    document.status.as_str(),
                    document.signed_at,
                    document.revoked_at,
                    document.revocation_reason,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateDocument(document.document_hash.to_string())
                } else {
                    StoreError::from(e)
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<SignedDocument>> {
        let id = *id;
        self.blocking(move |conn| load_document(conn, &id)).await
    }

    async fn get_document_by_hash(&self, hash: &DocumentHash) -> Result<Option<SignedDocument>> {
        let hash = hash.clone();

        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM signed_documents WHERE document_hash = ?1"),
                params![hash.as_str()],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn revoke_document(
        &self,
        id: &DocumentId,
        at: i64,
        reason: &str,
    ) -> Result<SignedDocument> {
        let id = *id;
        let reason = reason.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut document = load_document(&tx, &id)?
                .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;
            document.revoke(at, &reason)?;
            tx.execute(
                "UPDATE signed_documents
                 SET status = ?2, revoked_at = ?3, revocation_reason = ?4
                 WHERE document_id = ?1",
                params![
                    id.as_bytes().as_slice(),
                    document.status.as_str(),
                    document.revoked_at,
                    document.revocation_reason,
                ],
            )?;

            tx.commit()?;
            Ok(document)
        })
        .await
    }

    async fn count_documents(&self) -> Result<u64> {
        self.blocking(|conn| count(conn, "SELECT COUNT(*) FROM signed_documents", None))
            .await
    }

    async fn insert_report(&self, report: &SuspiciousReport) -> Result<()> {
        let report = report.clone();

        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO suspicious_reports ({REPORT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    report.id.as_bytes().as_slice(),
                    report.document_id.as_ref().map(|d| d.as_bytes().to_vec()),
                    report.document_hash.as_str(),
                    report.report_type.as_str(),
                    report.reason,
                    report.status.as_str(),
                    report.reporter.email,
                    report.reporter.name,
                    report.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<SuspiciousReport>> {
        let id = *id;
        self.blocking(move |conn| load_report(conn, &id)).await
    }

    async fn update_report_status(
        &self,
        id: &ReportId,
        to: ReportStatus,
    ) -> Result<SuspiciousReport> {
        let id = *id;

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut report = load_report(&tx, &id)?
                .ok_or_else(|| StoreError::NotFound(format!("report {}", id)))?;
            report.status.ensure_transition(to)?;
            report.status = to;
            tx.execute(
                "UPDATE suspicious_reports SET status = ?2 WHERE report_id = ?1",
                params![id.as_bytes().as_slice(), to.as_str()],
            )?;

            tx.commit()?;
            Ok(report)
        })
        .await
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        let record = record.clone();

        self.blocking(move |conn| {
            let details = serde_json::to_string(&record.event.details)?;
            conn.execute(
                &format!(
                    "INSERT INTO audit_logs ({AUDIT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    record.id.as_bytes().as_slice(),
                    record.event.actor,
                    record.event.action_type.as_str(),
                    record.event.resource_type.as_str(),
                    record.event.resource_id,
                    record.event.ip,
                    record.event.user_agent,
                    record.event.success,
                    details,
                    record.timestamp,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let query = query.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_logs
                 WHERE (?1 IS NULL OR action_type = ?1)
                   AND (?2 IS NULL OR resource_type = ?2)
                   AND (?3 IS NULL OR resource_id = ?3)
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?4"
            ))?;
            // SQLite treats a negative LIMIT as unbounded.
            let limit = query.limit.map_or(-1, |l| l as i64);
            let records = stmt
                .query_map(
                    params![
                        query.action.map(|a| a.as_str()),
                        query.resource_type.map(|r| r.as_str()),
                        query.resource_id,
                        limit,
                    ],
                    row_to_audit,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn count_audit(&self, action: ActionType) -> Result<u64> {
        self.blocking(move |conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM audit_logs WHERE action_type = ?1",
                Some(action.as_str()),
            )
        })
        .await
    }
}
