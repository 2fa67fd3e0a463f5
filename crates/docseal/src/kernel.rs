//! The Kernel: unified API for DocSeal.
//!
//! The Kernel wires the key store, document registry, report desk and
//! verification orchestrator over one shared store, clock and auditor.

use std::sync::Arc;

use serde::Serialize;

use docseal_core::{
    ActionType, AuditRecord, CryptographicKey, DocumentHash, DocumentId, Institution, KeyId,
    KeyStatus, ReportId, ReportStatus, SignedDocument, SuspiciousReport,
};
use docseal_store::{AuditQuery, Store};

use crate::audit::{AuditSink, Auditor, StoreAuditSink};
use crate::certificate::{CertificateRenderer, JsonCertificateRenderer};
use crate::clock::{Clock, SystemClock};
use crate::config::KernelConfig;
use crate::documents::{DocumentRegistry, DocumentSummary, NewDocument};
use crate::error::Result;
use crate::keys::{KeyLineage, KeyStore, NewKey, RotateKey, SweepReport};
use crate::reports::{NewReport, ReportDesk};
use crate::verify::{ClientInfo, Verification, VerificationOrchestrator};

/// Aggregate counters safe to show publicly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublicStats {
    /// VERIFY audit records, whatever their outcome.
    pub verifications: u64,
    pub documents: u64,
    pub active_keys: u64,
}

/// Builder for a [`Kernel`] with non-default collaborators.
pub struct KernelBuilder<S: Store> {
    store: Arc<S>,
    config: KernelConfig,
    clock: Option<Arc<dyn Clock>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    renderer: Option<Option<Arc<dyn CertificateRenderer>>>,
}

impl<S: Store + 'static> KernelBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: KernelConfig::default(),
            clock: None,
            audit_sink: None,
            renderer: None,
        }
    }

    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a [`StoreAuditSink`] over the kernel's store.
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Defaults to [`JsonCertificateRenderer`].
    pub fn renderer(mut self, renderer: Arc<dyn CertificateRenderer>) -> Self {
        self.renderer = Some(Some(renderer));
        self
    }

    /// Never produce certificates.
    pub fn without_renderer(mut self) -> Self {
        self.renderer = Some(None);
        self
    }

    pub fn build(self) -> Kernel<S> {
        let store = self.store;
        let config = Arc::new(self.config);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self
            .audit_sink
            .unwrap_or_else(|| Arc::new(StoreAuditSink::new(store.clone())));
        let renderer = self
            .renderer
            .unwrap_or_else(|| Some(Arc::new(JsonCertificateRenderer)));

        let auditor = Arc::new(Auditor::new(sink, clock.clone(), config.audit_attempts));
        let documents = Arc::new(DocumentRegistry::new(
            store.clone(),
            auditor.clone(),
            clock.clone(),
            config.clone(),
        ));
        let keys = KeyStore::new(store.clone(), auditor.clone(), clock.clone(), config.clone());
        let reports = ReportDesk::new(store.clone(), auditor.clone(), clock.clone());
        let verifier = VerificationOrchestrator::new(
            store.clone(),
            documents.clone(),
            auditor,
            clock.clone(),
            config.clone(),
            renderer,
        );

        Kernel {
            store,
            config,
            clock,
            keys,
            documents,
            reports,
            verifier,
        }
    }
}

/// The main Kernel struct.
///
/// Provides a unified API for:
/// - Verifying document hashes
/// - Registering, rotating, revoking and expiring institution keys
/// - Recording and revoking signed documents
/// - Filing and triaging suspicious-document reports
pub struct Kernel<S: Store> {
    store: Arc<S>,
    config: Arc<KernelConfig>,
    clock: Arc<dyn Clock>,
    keys: KeyStore<S>,
    documents: Arc<DocumentRegistry<S>>,
    reports: ReportDesk<S>,
    verifier: VerificationOrchestrator<S>,
}

impl<S: Store + 'static> Kernel<S> {
    /// Create a kernel with the system clock, store-backed audit and JSON
    /// certificates.
    pub fn new(store: S, config: KernelConfig) -> Self {
        KernelBuilder::new(Arc::new(store)).config(config).build()
    }

    pub fn builder(store: Arc<S>) -> KernelBuilder<S> {
        KernelBuilder::new(store)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a document hash and audit the outcome.
    pub async fn verify(&self, hash: &str, client: &ClientInfo) -> Result<Verification> {
        self.verifier.verify(hash, client).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Institutions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn upsert_institution(&self, institution: &Institution) -> Result<()> {
        self.store.upsert_institution(institution).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Keys
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn register_key(&self, request: NewKey, actor: &str) -> Result<CryptographicKey> {
        self.keys.register(request, actor).await
    }

    /// Atomically retire a key and install its successor.
    pub async fn rotate_key(&self, request: RotateKey, actor: &str) -> Result<CryptographicKey> {
        self.keys.rotate(request, actor).await
    }

    pub async fn revoke_key(
        &self,
        id: &KeyId,
        reason: &str,
        actor: &str,
    ) -> Result<CryptographicKey> {
        self.keys.revoke(id, reason, actor).await
    }

    /// Expire keys past their expiry. Safe to call repeatedly.
    pub async fn sweep_keys(&self) -> Result<SweepReport> {
        self.keys.sweep_expired().await
    }

    pub async fn key(&self, id: &KeyId) -> Result<CryptographicKey> {
        self.keys.get(id).await
    }

    pub async fn key_lineage(&self, id: &KeyId) -> Result<KeyLineage> {
        self.keys.lineage(id).await
    }

    pub fn keys(&self) -> &KeyStore<S> {
        &self.keys
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn record_document(&self, request: NewDocument) -> Result<SignedDocument> {
        self.documents.record(request).await
    }

    pub async fn revoke_document(
        &self,
        id: &DocumentId,
        reason: &str,
        actor: &str,
    ) -> Result<SignedDocument> {
        self.documents.revoke(id, reason, actor).await
    }

    /// Public summary for a hash. Not audited.
    pub async fn document_info(&self, hash: &str) -> Result<DocumentSummary> {
        let hash = DocumentHash::parse(hash)?;
        let document = self.documents.lookup(&hash).await?;
        self.documents.summary(&document).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reports
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn submit_report(&self, request: NewReport) -> Result<SuspiciousReport> {
        self.reports.submit(request).await
    }

    pub async fn report(&self, id: &ReportId) -> Result<SuspiciousReport> {
        self.reports.get(id).await
    }

    pub async fn set_report_status(
        &self,
        id: &ReportId,
        status: ReportStatus,
        actor: &str,
    ) -> Result<SuspiciousReport> {
        self.reports.set_status(id, status, actor).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statistics & audit
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn public_stats(&self) -> Result<PublicStats> {
        Ok(PublicStats {
            verifications: self.store.count_audit(ActionType::Verify).await?,
            documents: self.store.count_documents().await?,
            active_keys: self.store.count_keys(KeyStatus::Active).await?,
        })
    }

    /// Audit records matching `query`, newest first.
    pub async fn audit_history(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        Ok(self.store.list_audit(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use docseal_core::InstitutionId;
    use docseal_store::MemoryStore;

    fn kernel() -> Kernel<MemoryStore> {
        Kernel::builder(Arc::new(MemoryStore::new()))
            .clock(Arc::new(ManualClock::new(42)))
            .build()
    }

    #[tokio::test]
    async fn test_empty_stats() {
        let kernel = kernel();
        assert_eq!(kernel.public_stats().await.unwrap(), PublicStats::default());
    }

    #[tokio::test]
    async fn test_verifications_counted_in_stats() {
        let kernel = kernel();
        let hash = DocumentHash::of_content(b"unknown");
        kernel.verify(hash.as_str(), &ClientInfo::default()).await.unwrap();
        kernel.verify(hash.as_str(), &ClientInfo::default()).await.unwrap();

        let stats = kernel.public_stats().await.unwrap();
        assert_eq!(stats.verifications, 2);
        assert_eq!(stats.documents, 0);
    }

    #[tokio::test]
    async fn test_document_info_unknown_hash() {
        let kernel = kernel();
        let hash = DocumentHash::of_content(b"missing");
        let err = kernel.document_info(hash.as_str()).await.unwrap_err();
        assert!(matches!(err, crate::KernelError::DocumentNotFound(_)));

        // lookups are not audited
        assert_eq!(kernel.public_stats().await.unwrap().verifications, 0);
    }

    #[tokio::test]
    async fn test_upsert_institution_roundtrip() {
        let kernel = kernel();
        let institution = Institution {
            id: InstitutionId::new(),
            name: "Université de Yaoundé I".into(),
            slug: "uy1".into(),
        };
        kernel.upsert_institution(&institution).await.unwrap();
        let stored = kernel
            .store()
            .get_institution(&institution.id)
            .await
            .unwrap();
        assert_eq!(stored, Some(institution));
    }
}
