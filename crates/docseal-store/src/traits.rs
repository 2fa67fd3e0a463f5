//! Store trait: the abstract interface for DocSeal persistence.
//!
//! The kernel services are storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use docseal_core::{
    ActionType, AuditRecord, CryptographicKey, DocumentHash, DocumentId, Fingerprint,
    Institution, InstitutionId, KeyId, KeyRotation, KeyStatus, ReportId, ReportStatus,
    ResourceType, SignedDocument, SuspiciousReport,
};

use crate::error::Result;

/// Filter for reading audit history. Results come back newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub action: Option<ActionType>,
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<String>,
    /// Maximum rows to return; `None` returns everything that matches.
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn action(action: ActionType) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn resource(mut self, resource_type: ResourceType, id: impl ToString) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.action.map_or(true, |a| record.event.action_type == a)
            && self
                .resource_type
                .map_or(true, |r| record.event.resource_type == r)
            && self
                .resource_id
                .as_ref()
                .map_or(true, |id| record.event.resource_id.as_ref() == Some(id))
    }
}

/// The Store trait: async interface for DocSeal persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Uniqueness**: key fingerprints and document hashes are unique; a second
///   insert fails with `DuplicateFingerprint` / `DuplicateDocument`.
/// - **Transitions**: status mutators check the transition table against the
///   stored status inside the same operation, so a stale read cannot bypass it.
/// - **Rotation**: `rotate_key` commits all of its writes or none of them.
/// - **Audit**: records are append-only; there is no update or delete.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Institution Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace an institution reference.
    async fn upsert_institution(&self, institution: &Institution) -> Result<()>;

    async fn get_institution(&self, id: &InstitutionId) -> Result<Option<Institution>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new key. Fails with `DuplicateFingerprint` on collision.
    async fn insert_key(&self, key: &CryptographicKey) -> Result<()>;

    async fn get_key(&self, id: &KeyId) -> Result<Option<CryptographicKey>>;

    async fn get_key_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CryptographicKey>>;

    /// All keys of an institution, oldest first.
    async fn list_keys(&self, institution: &InstitutionId) -> Result<Vec<CryptographicKey>>;

    /// Move a key to `to`, checking the transition table against the stored
    /// status. Returns the updated key.
    async fn transition_key(
        &self,
        id: &KeyId,
        to: KeyStatus,
        at: i64,
        reason: Option<&str>,
    ) -> Result<CryptographicKey>;

    /// Atomically replace `old` with `new_key`.
    ///
    /// Inserts `new_key`, flips `old` to ROTATED and records `rotation`. Any
    /// failure leaves the store exactly as it was.
    async fn rotate_key(
        &self,
        old: &KeyId,
        new_key: &CryptographicKey,
        rotation: &KeyRotation,
    ) -> Result<()>;

    /// Move every live key with `expires_at <= now` to EXPIRED.
    ///
    /// Returns the ids that changed; a second call with the same `now`
    /// returns nothing.
    async fn expire_keys(&self, now: i64) -> Result<Vec<KeyId>>;

    /// Move ACTIVE keys with `now < expires_at <= now + window_ms` to
    /// EXPIRING_SOON. Returns the ids that changed.
    async fn mark_expiring(&self, now: i64, window_ms: i64) -> Result<Vec<KeyId>>;

    /// Rotation edges where `key` is either the old or the new key.
    async fn list_rotations(&self, key: &KeyId) -> Result<Vec<KeyRotation>>;

    async fn count_keys(&self, status: KeyStatus) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a signed document. Fails with `DuplicateDocument` on hash collision.
    async fn insert_document(&self, document: &SignedDocument) -> Result<()>;

    async fn get_document(&self, id: &DocumentId) -> Result<Option<SignedDocument>>;

    async fn get_document_by_hash(&self, hash: &DocumentHash) -> Result<Option<SignedDocument>>;

    /// AUTHENTIC -> REVOKED, checked against the stored status.
    async fn revoke_document(
        &self,
        id: &DocumentId,
        at: i64,
        reason: &str,
    ) -> Result<SignedDocument>;

    async fn count_documents(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Report Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_report(&self, report: &SuspiciousReport) -> Result<()>;

    async fn get_report(&self, id: &ReportId) -> Result<Option<SuspiciousReport>>;

    /// Move a report to `to`, checked against the report transition table.
    async fn update_report_status(
        &self,
        id: &ReportId,
        to: ReportStatus,
    ) -> Result<SuspiciousReport>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an audit record.
    async fn append_audit(&self, record: &AuditRecord) -> Result<()>;

    /// Read audit history matching `query`, newest first.
    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>>;

    async fn count_audit(&self, action: ActionType) -> Result<u64>;
}
