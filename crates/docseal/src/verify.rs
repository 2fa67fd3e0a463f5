//! Verification orchestration.
//!
//! A verification walks a fixed ladder and stops at the first rung that
//! matches:
//!
//! 1. no document for the hash: [`VerificationOutcome::NotFound`]
//! 2. document revoked: [`VerificationOutcome::Revoked`]
//! 3. signing key missing or not ACTIVE: [`VerificationOutcome::KeyExpired`]
//! 4. signature check against the signing key
//!
//! Only the last rung touches cryptography. Every call ends with exactly one
//! VERIFY audit record.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use docseal_core::crypto;
use docseal_core::{
    ActionType, AuditEvent, DocumentHash, DocumentStatus, ResourceType, SignatureCheck,
    SignedDocument, VerificationId,
};
use docseal_store::Store;

use crate::audit::Auditor;
use crate::certificate::{Certificate, CertificateRenderer, CertificateRequest};
use crate::clock::Clock;
use crate::config::KernelConfig;
use crate::documents::{DocumentRegistry, DocumentSummary};
use crate::error::Result;

/// The closed set of verification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    NotFound,
    Revoked,
    KeyExpired,
    Authentic,
    InvalidSignature,
    VerificationError,
}

impl VerificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::NotFound => "NOT_FOUND",
            VerificationOutcome::Revoked => "REVOKED",
            VerificationOutcome::KeyExpired => "KEY_EXPIRED",
            VerificationOutcome::Authentic => "AUTHENTIC",
            VerificationOutcome::InvalidSignature => "INVALID_SIGNATURE",
            VerificationOutcome::VerificationError => "VERIFICATION_ERROR",
        }
    }

    pub fn is_authentic(&self) -> bool {
        *self == VerificationOutcome::Authentic
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking. Recorded on the audit entry only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
    pub actor: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
            actor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revocation {
    pub revoked_at: Option<i64>,
    pub reason: Option<String>,
}

/// Result of one verification call.
#[derive(Debug, Clone)]
pub struct Verification {
    pub outcome: VerificationOutcome,
    /// Fresh for every call.
    pub verification_id: VerificationId,
    pub document_hash: DocumentHash,
    pub verified_at: i64,
    pub document: Option<DocumentSummary>,
    pub revocation: Option<Revocation>,
    pub certificate: Option<Certificate>,
}

pub struct VerificationOrchestrator<S: Store> {
    store: Arc<S>,
    documents: Arc<DocumentRegistry<S>>,
    auditor: Arc<Auditor>,
    clock: Arc<dyn Clock>,
    config: Arc<KernelConfig>,
    renderer: Option<Arc<dyn CertificateRenderer>>,
}

impl<S: Store> VerificationOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        documents: Arc<DocumentRegistry<S>>,
        auditor: Arc<Auditor>,
        clock: Arc<dyn Clock>,
        config: Arc<KernelConfig>,
        renderer: Option<Arc<dyn CertificateRenderer>>,
    ) -> Self {
        Self {
            store,
            documents,
            auditor,
            clock,
            config,
            renderer,
        }
    }

    /// Verify a document hash.
    ///
    /// A malformed hash is an `Input` error raised before any lookup or
    /// audit. Storage failures propagate as errors; every classified outcome
    /// is audited exactly once, before the public summary is assembled.
    pub async fn verify(&self, raw_hash: &str, client: &ClientInfo) -> Result<Verification> {
        let document_hash = DocumentHash::parse(raw_hash)?;
        let verification_id = VerificationId::new();
        let verified_at = self.clock.now_millis();

        let document = self.store.get_document_by_hash(&document_hash).await?;
        let outcome = match &document {
            Some(doc) => self.classify(doc).await?,
            None => VerificationOutcome::NotFound,
        };

        tracing::debug!(
            verification_id = %verification_id,
            hash = %document_hash,
            outcome = %outcome,
            "verified document"
        );

        let mut event = AuditEvent::new(ActionType::Verify, ResourceType::Document)
            .client(client.ip.clone(), client.user_agent.clone())
            .success(outcome.is_authentic())
            .details(json!({
                "document_hash": document_hash.as_str(),
                "result": outcome.as_str(),
            }));
        if let Some(doc) = &document {
            event = event.resource(doc.id);
        }
        if let Some(actor) = &client.actor {
            event = event.actor(actor.clone());
        }
        self.auditor.emit(event).await;

        let summary = match &document {
            Some(doc) => Some(self.documents.summary(doc).await?),
            None => None,
        };

        let revocation = document
            .as_ref()
            .filter(|_| outcome == VerificationOutcome::Revoked)
            .map(|doc| Revocation {
                revoked_at: doc.revoked_at,
                reason: doc.revocation_reason.clone(),
            });
        let certificate = match &summary {
            Some(summary) if outcome.is_authentic() => {
                self.certificate(verification_id, verified_at, summary).await
            }
            _ => None,
        };

        Ok(Verification {
            outcome,
            verification_id,
            document_hash,
            verified_at,
            document: summary,
            revocation,
            certificate,
        })
    }

    /// Rungs 2-4 of the ladder for a document that exists.
    async fn classify(&self, document: &SignedDocument) -> Result<VerificationOutcome> {
        if document.status == DocumentStatus::Revoked {
            return Ok(VerificationOutcome::Revoked);
        }

        let key = match self.store.get_key(&document.key_id).await? {
            Some(key) if key.is_active() => key,
            Some(_) => return Ok(VerificationOutcome::KeyExpired),
            None => {
                tracing::warn!(
                    document_id = %document.id,
                    key_id = %document.key_id,
                    "signing key row missing"
                );
                return Ok(VerificationOutcome::KeyExpired);
            }
        };

        let check = crypto::check(
            &key.public_key,
            document.document_hash.message_bytes(),
            &document.signature,
        );
        Ok(match check {
            SignatureCheck::Valid => VerificationOutcome::Authentic,
            SignatureCheck::Invalid => VerificationOutcome::InvalidSignature,
            SignatureCheck::Unreadable => {
                tracing::warn!(key_id = %key.id, "stored key material is unreadable");
                VerificationOutcome::VerificationError
            }
        })
    }

    async fn certificate(
        &self,
        verification_id: VerificationId,
        verified_at: i64,
        summary: &DocumentSummary,
    ) -> Option<Certificate> {
        if !self.config.issue_certificates {
            return None;
        }
        let renderer = self.renderer.as_ref()?;

        let request = CertificateRequest {
            verification_id,
            document_hash: summary.document_hash.clone(),
            institution_name: summary.institution_name.clone().unwrap_or_default(),
            signed_at: summary.signed_at,
            verified_at,
            verify_url: self.config.verify_url(summary.document_hash.as_str()),
        };
        match renderer.render(&request).await {
            Ok(certificate) => Some(certificate),
            Err(e) => {
                tracing::warn!(
                    verification_id = %verification_id,
                    error = %e,
                    "certificate rendering failed"
                );
                None
            }
        }
    }
}
