//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Every mutator runs
//! its checks and writes under a single write lock.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use docseal_core::{
    ActionType, AuditRecord, CryptographicKey, DocumentHash, DocumentId, Fingerprint,
    Institution, InstitutionId, KeyId, KeyRotation, KeyStatus, ReportId, ReportStatus,
    SignedDocument, SuspiciousReport,
};

use crate::error::{Result, StoreError};
use crate::traits::{AuditQuery, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    institutions: HashMap<InstitutionId, Institution>,

    /// Keys indexed by ID, with insertion order kept for listings.
    keys: HashMap<KeyId, CryptographicKey>,
    key_order: Vec<KeyId>,

    /// Fingerprint uniqueness index.
    fingerprints: HashMap<Fingerprint, KeyId>,

    rotations: Vec<KeyRotation>,

    documents: HashMap<DocumentId, SignedDocument>,

    /// Document hash uniqueness index.
    hashes: HashMap<DocumentHash, DocumentId>,

    reports: HashMap<ReportId, SuspiciousReport>,

    /// Audit records in append order.
    audit: Vec<AuditRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn key_mut(&mut self, id: &KeyId) -> Result<&mut CryptographicKey> {
        self.keys
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("key {}", id)))
    }

    fn check_new_key(&self, key: &CryptographicKey) -> Result<()> {
        if self.fingerprints.contains_key(&key.fingerprint) {
            return Err(StoreError::DuplicateFingerprint(key.fingerprint.to_hex()));
        }
        if self.keys.contains_key(&key.id) {
            return Err(StoreError::InvalidData(format!("key {} already exists", key.id)));
        }
        Ok(())
    }

    fn put_key(&mut self, key: &CryptographicKey) {
        self.fingerprints.insert(key.fingerprint, key.id);
        self.key_order.push(key.id);
        self.keys.insert(key.id, key.clone());
    }

    /// Apply `next` to every key matching `pred`, in expiry order.
    fn sweep(
        &mut self,
        next: KeyStatus,
        at: i64,
        pred: impl Fn(&CryptographicKey) -> bool,
    ) -> Result<Vec<KeyId>> {
        let mut changed: Vec<(i64, usize, KeyId)> = self
            .key_order
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| self.keys.get(id).map(|k| (pos, k)))
            .filter(|(_, k)| pred(k))
            .map(|(pos, k)| (k.expires_at, pos, k.id))
            .collect();
        changed.sort();

        for (_, _, id) in &changed {
            self.key_mut(id)?.transition(next, at, None)?;
        }
        Ok(changed.into_iter().map(|(_, _, id)| id).collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_institution(&self, institution: &Institution) -> Result<()> {
        let mut inner = self.write()?;
        if inner
            .institutions
            .values()
            .any(|i| i.slug == institution.slug && i.id != institution.id)
        {
            return Err(StoreError::DuplicateSlug(institution.slug.clone()));
        }
        inner
            .institutions
            .insert(institution.id, institution.clone());
        Ok(())
    }

    async fn get_institution(&self, id: &InstitutionId) -> Result<Option<Institution>> {
        let inner = self.read()?;
        Ok(inner.institutions.get(id).cloned())
    }

    async fn insert_key(&self, key: &CryptographicKey) -> Result<()> {
        let mut inner = self.write()?;
        inner.check_new_key(key)?;
        inner.put_key(key);
        Ok(())
    }

    async fn get_key(&self, id: &KeyId) -> Result<Option<CryptographicKey>> {
        let inner = self.read()?;
        Ok(inner.keys.get(id).cloned())
    }

    async fn get_key_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CryptographicKey>> {
        let inner = self.read()?;
        Ok(inner
            .fingerprints
            .get(fingerprint)
            .and_then(|id| inner.keys.get(id))
            .cloned())
    }

    async fn list_keys(&self, institution: &InstitutionId) -> Result<Vec<CryptographicKey>> {
        let inner = self.read()?;
        let mut keys: Vec<CryptographicKey> = inner
            .key_order
            .iter()
            .filter_map(|id| inner.keys.get(id))
            .filter(|k| &k.institution_id == institution)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn transition_key(
        &self,
        id: &KeyId,
        to: KeyStatus,
        at: i64,
        reason: Option<&str>,
    ) -> Result<CryptographicKey> {
        let mut inner = self.write()?;
        let key = inner.key_mut(id)?;
        key.transition(to, at, reason)?;
        Ok(key.clone())
    }

    async fn rotate_key(
        &self,
        old: &KeyId,
        new_key: &CryptographicKey,
        rotation: &KeyRotation,
    ) -> Result<()> {
        let mut inner = self.write()?;

        // Every check runs before the first write.
        let old_status = inner
            .keys
            .get(old)
            .map(|k| k.status)
            .ok_or_else(|| StoreError::NotFound(format!("key {}", old)))?;
        old_status.ensure_transition(KeyStatus::Rotated)?;
        inner.check_new_key(new_key)?;

        inner.put_key(new_key);
        inner
            .key_mut(old)?
            .transition(KeyStatus::Rotated, rotation.timestamp, None)?;
        inner.rotations.push(rotation.clone());
        Ok(())
    }

    async fn expire_keys(&self, now: i64) -> Result<Vec<KeyId>> {
        let mut inner = self.write()?;
        inner.sweep(KeyStatus::Expired, now, |k| {
            KeyStatus::LIVE.contains(&k.status) && k.is_past_expiry(now)
        })
    }

    async fn mark_expiring(&self, now: i64, window_ms: i64) -> Result<Vec<KeyId>> {
        let until = now.saturating_add(window_ms);
        let mut inner = self.write()?;
        inner.sweep(KeyStatus::ExpiringSoon, now, |k| {
            k.status == KeyStatus::Active && k.expires_at > now && k.expires_at <= until
        })
    }

    async fn list_rotations(&self, key: &KeyId) -> Result<Vec<KeyRotation>> {
        let inner = self.read()?;
        let mut edges: Vec<KeyRotation> = inner
            .rotations
            .iter()
            .filter(|r| &r.old_key == key || &r.new_key == key)
            .cloned()
            .collect();
        edges.sort_by_key(|r| r.timestamp);
        Ok(edges)
    }

    async fn count_keys(&self, status: KeyStatus) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.keys.values().filter(|k| k.status == status).count() as u64)
    }

    async fn insert_document(&self, document: &SignedDocument) -> Result<()> {
        let mut inner = self.write()?;

        if inner.hashes.contains_key(&document.document_hash) {
            return Err(StoreError::DuplicateDocument(
                document.document_hash.to_string(),
            ));
        }
        if inner.documents.contains_key(&document.id) {
            return Err(StoreError::InvalidData(format!(
                "document {} already exists",
                document.id
            )));
        }

        inner
            .hashes
            .insert(document.document_hash.clone(), document.id);
        inner.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<SignedDocument>> {
        let inner = self.read()?;
        Ok(inner.documents.get(id).cloned())
    }

    async fn get_document_by_hash(&self, hash: &DocumentHash) -> Result<Option<SignedDocument>> {
        let inner = self.read()?;
        Ok(inner
            .hashes
            .get(hash)
            .and_then(|id| inner.documents.get(id))
            .cloned())
    }

    async fn revoke_document(
        &self,
        id: &DocumentId,
        at: i64,
        reason: &str,
    ) -> Result<SignedDocument> {
        let mut inner = self.write()?;
        let document = inner
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;
        document.revoke(at, reason)?;
        Ok(document.clone())
    }

    async fn count_documents(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.documents.len() as u64)
    }

    async fn insert_report(&self, report: &SuspiciousReport) -> Result<()> {
        let mut inner = self.write()?;
        inner.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn get_report(&self, id: &ReportId) -> Result<Option<SuspiciousReport>> {
        let inner = self.read()?;
        Ok(inner.reports.get(id).cloned())
    }

    async fn update_report_status(
        &self,
        id: &ReportId,
        to: ReportStatus,
    ) -> Result<SuspiciousReport> {
        let mut inner = self.write()?;
        let report = inner
            .reports
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("report {}", id)))?;
        report.status.ensure_transition(to)?;
        report.status = to;
        Ok(report.clone())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        let mut inner = self.write()?;
        inner.audit.push(record.clone());
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        let inner = self.read()?;
        let mut records: Vec<AuditRecord> = inner
            .audit
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        // Newest append first among equal timestamps.
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn count_audit(&self, action: ActionType) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner
            .audit
            .iter()
            .filter(|r| r.event.action_type == action)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docseal_core::{
        Algorithm, AuditEvent, KeyValidation, ResourceType, RotationId, RotationType,
    };
    use proptest::prelude::*;

    fn make_test_key(institution: InstitutionId, seed: u8, expires_at: i64) -> CryptographicKey {
        CryptographicKey {
            id: KeyId::new(),
            institution_id: institution,
            public_key: Bytes::from(vec![seed; 8]),
            fingerprint: Fingerprint([seed; 32]),
            algorithm: Algorithm::Rsa2048,
            key_size: 2048,
            status: KeyStatus::Active,
            created_at: 1_000,
            expires_at,
            revoked_at: None,
            revocation_reason: None,
            parent_key: None,
            validation: KeyValidation::default(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let key = make_test_key(InstitutionId::new(), 1, 10_000);

        store.insert_key(&key).await.unwrap();

        let retrieved = store.get_key(&key.id).await.unwrap().unwrap();
        assert_eq!(retrieved, key);
        assert!(matches!(
            store.insert_key(&key).await.unwrap_err(),
            StoreError::DuplicateFingerprint(_)
        ));
    }

    #[tokio::test]
    async fn test_institution_slug_is_unique() {
        let store = MemoryStore::new();
        let first = Institution {
            id: InstitutionId::new(),
            name: "Université de Douala".into(),
            slug: "udo".into(),
        };
        store.upsert_institution(&first).await.unwrap();
        store.upsert_institution(&first).await.unwrap();

        let squatter = Institution {
            id: InstitutionId::new(),
            name: "Impostor".into(),
            slug: "udo".into(),
        };
        assert!(matches!(
            store.upsert_institution(&squatter).await.unwrap_err(),
            StoreError::DuplicateSlug(_)
        ));
        assert!(store.get_institution(&squatter.id).await.unwrap().is_none());

        // moving onto a taken slug is rejected too
        let second = Institution {
            id: InstitutionId::new(),
            name: "Université de Buea".into(),
            slug: "ub".into(),
        };
        store.upsert_institution(&second).await.unwrap();
        let moved = Institution {
            slug: "udo".into(),
            ..second.clone()
        };
        assert!(matches!(
            store.upsert_institution(&moved).await.unwrap_err(),
            StoreError::DuplicateSlug(_)
        ));
        assert_eq!(store.get_institution(&second.id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_expiring_soon_key_is_not_revocable() {
        let store = MemoryStore::new();
        let mut key = make_test_key(InstitutionId::new(), 4, 10_000);
        key.status = KeyStatus::ExpiringSoon;
        store.insert_key(&key).await.unwrap();

        assert!(matches!(
            store
                .transition_key(&key.id, KeyStatus::Revoked, 2_000, Some("leak"))
                .await
                .unwrap_err(),
            StoreError::Transition(_)
        ));
        let stored = store.get_key(&key.id).await.unwrap().unwrap();
        assert_eq!(stored.status, KeyStatus::ExpiringSoon);
    }

    #[tokio::test]
    async fn test_rotate_rejects_terminal_old_key_without_writes() {
        let store = MemoryStore::new();
        let institution = InstitutionId::new();
        let old = make_test_key(institution, 2, 10_000);
        let new = make_test_key(institution, 3, 10_000);
        store.insert_key(&old).await.unwrap();
        store
            .transition_key(&old.id, KeyStatus::Revoked, 2_000, Some("leak"))
            .await
            .unwrap();

        let rotation = KeyRotation {
            id: RotationId::new(),
            old_key: old.id,
            new_key: new.id,
            rotation_type: RotationType::Manual,
            reason: "replace".into(),
            actor: "admin".into(),
            timestamp: 3_000,
        };
        assert!(matches!(
            store.rotate_key(&old.id, &new, &rotation).await.unwrap_err(),
            StoreError::Transition(_)
        ));
        assert!(store.get_key(&new.id).await.unwrap().is_none());
        assert!(store.list_rotations(&old.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_query_filters() {
        let store = MemoryStore::new();
        let doc = DocumentId::new();
        store
            .append_audit(
                &AuditEvent::new(ActionType::Verify, ResourceType::Document)
                    .resource(doc)
                    .into_record(10),
            )
            .await
            .unwrap();
        store
            .append_audit(&AuditEvent::new(ActionType::Verify, ResourceType::Document).into_record(10))
            .await
            .unwrap();

        let for_doc = store
            .list_audit(&AuditQuery::action(ActionType::Verify).resource(ResourceType::Document, doc))
            .await
            .unwrap();
        assert_eq!(for_doc.len(), 1);

        let all = store
            .list_audit(&AuditQuery::action(ActionType::Verify))
            .await
            .unwrap();
        // Same timestamp: the later append comes first.
        assert_eq!(all[0].event.resource_id, None);
    }

    proptest! {
        #[test]
        fn prop_expire_sweep_idempotent(
            expiries in proptest::collection::vec(0i64..10_000, 1..20),
            now in 0i64..10_000,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let institution = InstitutionId::new();
                for (i, expires_at) in expiries.iter().enumerate() {
                    store
                        .insert_key(&make_test_key(institution, i as u8, *expires_at))
                        .await
                        .unwrap();
                }

                let first = store.expire_keys(now).await.unwrap();
                let expected = expiries.iter().filter(|e| **e <= now).count();
                assert_eq!(first.len(), expected);

                let snapshot = store.list_keys(&institution).await.unwrap();
                assert!(store.expire_keys(now).await.unwrap().is_empty());
                assert_eq!(store.list_keys(&institution).await.unwrap(), snapshot);
            });
        }
    }
}
