//! Registry of signed documents.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

use docseal_core::crypto;
use docseal_core::{
    ActionType, Algorithm, AuditEvent, DocumentHash, DocumentId, DocumentStatus, InstitutionId,
    KeyId, ResourceType, SignedDocument,
};
use docseal_store::Store;

use crate::audit::Auditor;
use crate::clock::Clock;
use crate::config::KernelConfig;
use crate::error::{or_not_found, KernelError, Result};

/// A document produced by the upstream signer.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub institution_id: InstitutionId,
    pub key_id: KeyId,
    /// Hex SHA-256 of the document; any case, surrounding whitespace ignored.
    pub document_hash: String,
    pub signature: Bytes,
    /// Defaults to now.
    pub signed_at: Option<i64>,
}

/// Publicly visible facts about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub document_hash: DocumentHash,
    /// `None` when the institution row is missing.
    pub institution_name: Option<String>,
    pub signed_at: i64,
    /// `None` when the signing key row is missing.
    pub algorithm: Option<Algorithm>,
    pub status: DocumentStatus,
    pub revoked_at: Option<i64>,
    pub revocation_reason: Option<String>,
}

pub struct DocumentRegistry<S: Store> {
    store: Arc<S>,
    auditor: Arc<Auditor>,
    clock: Arc<dyn Clock>,
    config: Arc<KernelConfig>,
}

impl<S: Store> DocumentRegistry<S> {
    pub fn new(
        store: Arc<S>,
        auditor: Arc<Auditor>,
        clock: Arc<dyn Clock>,
        config: Arc<KernelConfig>,
    ) -> Self {
        Self {
            store,
            auditor,
            clock,
            config,
        }
    }

    /// Exact-match lookup by hash.
    pub async fn lookup(&self, hash: &DocumentHash) -> Result<SignedDocument> {
        self.store
            .get_document_by_hash(hash)
            .await?
            .ok_or_else(|| KernelError::DocumentNotFound(hash.to_string()))
    }

    /// Store a signed document after checking it against its key.
    ///
    /// Nothing is written unless the hash parses, the key exists, belongs to
    /// the institution, is ACTIVE and (when configured) verifies the signature.
    pub async fn record(&self, request: NewDocument) -> Result<SignedDocument> {
        let document_hash = DocumentHash::parse(&request.document_hash)?;
        if request.signature.is_empty() {
            return Err(KernelError::Input("empty signature".into()));
        }

        let key = self
            .store
            .get_key(&request.key_id)
            .await?
            .ok_or(KernelError::KeyNotFound(request.key_id))?;
        if key.institution_id != request.institution_id {
            return Err(KernelError::Input(format!(
                "key {} does not belong to institution {}",
                key.id, request.institution_id
            )));
        }
        if !key.is_active() {
            return Err(KernelError::KeyNotActive {
                key: key.id,
                status: key.status,
            });
        }
        if self.config.verify_signature_on_record
            && !crypto::verify(
                &key.public_key,
                document_hash.message_bytes(),
                &request.signature,
            )
        {
            return Err(KernelError::Input(
                "signature does not verify against the signing key".into(),
            ));
        }

        let document = SignedDocument {
            id: DocumentId::new(),
            institution_id: request.institution_id,
            key_id: key.id,
            document_hash,
            signature: request.signature,
            status: DocumentStatus::Authentic,
            signed_at: request
                .signed_at
                .unwrap_or_else(|| self.clock.now_millis()),
            revoked_at: None,
            revocation_reason: None,
        };

        self.store.insert_document(&document).await?;
        tracing::info!(
            document_id = %document.id,
            key_id = %document.key_id,
            hash = %document.document_hash,
            "recorded document"
        );

        self.auditor
            .emit(
                AuditEvent::new(ActionType::Sign, ResourceType::Document)
                    .resource(document.id)
                    .details(json!({
                        "document_hash": document.document_hash.as_str(),
                        "key_id": document.key_id.to_string(),
                        "institution_id": document.institution_id.to_string(),
                    })),
            )
            .await;

        Ok(document)
    }

    /// AUTHENTIC -> REVOKED. Irreversible.
    pub async fn revoke(
        &self,
        id: &DocumentId,
        reason: &str,
        actor: &str,
    ) -> Result<SignedDocument> {
        let now = self.clock.now_millis();
        let document = self
            .store
            .revoke_document(id, now, reason)
            .await
            .map_err(|e| or_not_found(e, || KernelError::DocumentNotFound(id.to_string())))?;
        tracing::info!(document_id = %document.id, reason, "revoked document");

        self.auditor
            .emit(
                AuditEvent::new(ActionType::Revoke, ResourceType::Document)
                    .actor(actor)
                    .resource(document.id)
                    .details(json!({
                        "document_hash": document.document_hash.as_str(),
                        "reason": reason,
                    })),
            )
            .await;

        Ok(document)
    }

    /// Public summary of a document.
    pub async fn summary(&self, document: &SignedDocument) -> Result<DocumentSummary> {
        let institution = self.store.get_institution(&document.institution_id).await?;
        let key = self.store.get_key(&document.key_id).await?;

        Ok(DocumentSummary {
            document_id: document.id,
            document_hash: document.document_hash.clone(),
            institution_name: institution.map(|i| i.name),
            signed_at: document.signed_at,
            algorithm: key.map(|k| k.algorithm),
            status: document.status,
            revoked_at: document.revoked_at,
            revocation_reason: document.revocation_reason.clone(),
        })
    }
}
