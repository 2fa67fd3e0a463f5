//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: signing key material for every
//! supported algorithm, collaborators that record or fail on demand, and a
//! [`ScenarioFixture`] bundling a kernel over an in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pss, RsaPrivateKey};
use sha2::{Digest, Sha256};

use docseal::{
    AuditError, AuditSink, Certificate, CertificateRenderer, CertificateRequest, ClientInfo,
    Kernel, KernelConfig, ManualClock, NewDocument, NewKey, RenderError, StoreAuditSink,
};
use docseal_core::crypto::pss_max_salt_len;
use docseal_core::{
    ActionType, Algorithm, AuditRecord, CryptographicKey, DocumentHash, Institution,
    InstitutionId, SignedDocument,
};
use docseal_store::MemoryStore;

/// Fixed start time for scenario clocks: 2024-01-01T00:00:00Z.
pub const EPOCH: i64 = 1_704_067_200_000;

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

enum Signer {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

/// A private key able to sign document hashes the way institutions do.
pub struct KeyMaterial {
    algorithm: Algorithm,
    signer: Signer,
}

impl KeyMaterial {
    /// Generate fresh key material for `algorithm`.
    ///
    /// RSA generation is slow; prefer EC keys where the family is irrelevant.
    pub fn generate(algorithm: Algorithm) -> Self {
        let mut rng = rand::thread_rng();
        let signer = match algorithm {
            Algorithm::Rsa2048 => Signer::Rsa(Box::new(
                RsaPrivateKey::new(&mut rng, 2048).expect("rsa-2048 keygen"),
            )),
            Algorithm::Rsa4096 => Signer::Rsa(Box::new(
                RsaPrivateKey::new(&mut rng, 4096).expect("rsa-4096 keygen"),
            )),
            Algorithm::EcdsaP256 => Signer::P256(p256::ecdsa::SigningKey::random(&mut rng)),
            Algorithm::EcdsaP384 => Signer::P384(p384::ecdsa::SigningKey::random(&mut rng)),
        };
        Self { algorithm, signer }
    }

    pub fn p256() -> Self {
        Self::generate(Algorithm::EcdsaP256)
    }

    pub fn p384() -> Self {
        Self::generate(Algorithm::EcdsaP384)
    }

    pub fn rsa() -> Self {
        Self::generate(Algorithm::Rsa2048)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// SubjectPublicKeyInfo PEM.
    pub fn public_pem(&self) -> Bytes {
        let pem = match &self.signer {
            Signer::Rsa(key) => key.to_public_key().to_public_key_pem(LineEnding::LF).ok(),
            Signer::P256(key) => p256::pkcs8::EncodePublicKey::to_public_key_pem(
                &p256::PublicKey::from(key.verifying_key()),
                p256::pkcs8::LineEnding::LF,
            )
            .ok(),
            Signer::P384(key) => p384::pkcs8::EncodePublicKey::to_public_key_pem(
                &p384::PublicKey::from(key.verifying_key()),
                p384::pkcs8::LineEnding::LF,
            )
            .ok(),
        };
        Bytes::from(pem.expect("public key pem"))
    }

    /// SubjectPublicKeyInfo DER of the same key.
    pub fn public_der(&self) -> Bytes {
        let der = match &self.signer {
            Signer::Rsa(key) => key
                .to_public_key()
                .to_public_key_der()
                .ok()
                .map(|d| d.as_bytes().to_vec()),
            Signer::P256(key) => p256::pkcs8::EncodePublicKey::to_public_key_der(
                &p256::PublicKey::from(key.verifying_key()),
            )
            .ok()
            .map(|d| d.as_bytes().to_vec()),
            Signer::P384(key) => p384::pkcs8::EncodePublicKey::to_public_key_der(
                &p384::PublicKey::from(key.verifying_key()),
            )
            .ok()
            .map(|d| d.as_bytes().to_vec()),
        };
        Bytes::from(der.expect("public key der"))
    }

    /// Sign the UTF-8 hex of `hash`: RSA-PSS with maximum salt, or DER ECDSA,
    /// both over SHA-256.
    pub fn sign(&self, hash: &DocumentHash) -> Bytes {
        let digest = Sha256::digest(hash.message_bytes());
        let signature = match &self.signer {
            Signer::Rsa(key) => {
                let salt = pss_max_salt_len(&key.to_public_key());
                key.sign_with_rng(
                    &mut rand::thread_rng(),
                    Pss::new_with_salt::<Sha256>(salt),
                    &digest,
                )
                .expect("rsa-pss sign")
            }
            Signer::P256(key) => {
                use p256::ecdsa::signature::hazmat::PrehashSigner;
                let sig: p256::ecdsa::Signature =
                    key.sign_prehash(&digest).expect("p256 sign");
                sig.to_der().as_bytes().to_vec()
            }
            Signer::P384(key) => {
                use p384::ecdsa::signature::hazmat::PrehashSigner;
                let sig: p384::ecdsa::Signature =
                    key.sign_prehash(&digest).expect("p384 sign");
                sig.to_der().as_bytes().to_vec()
            }
        };
        Bytes::from(signature)
    }
}

/// Flip a single bit of a signature.
pub fn tamper(signature: &[u8], bit: usize) -> Bytes {
    let mut bytes = signature.to_vec();
    let index = (bit / 8) % bytes.len().max(1);
    if let Some(byte) = bytes.get_mut(index) {
        *byte ^= 1 << (bit % 8);
    }
    Bytes::from(bytes)
}

/// Audit sink that keeps every record it sees and optionally forwards them.
///
/// [`fail_next`](Self::fail_next) makes the following deliveries fail
/// without recording.
#[derive(Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    failures: AtomicU32,
    forward: Option<Arc<dyn AuditSink>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(inner: Arc<dyn AuditSink>) -> Self {
        Self {
            forward: Some(inner),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, attempts: u32) {
        self.failures.store(attempts, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn of(&self, action: ActionType) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event.action_type == action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuditError::Unavailable("injected failure".into()));
        }

        if let Some(inner) = &self.forward {
            inner.record(record).await?;
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Renderer that always fails.
#[derive(Debug, Default)]
pub struct FailingRenderer;

#[async_trait]
impl CertificateRenderer for FailingRenderer {
    async fn render(&self, _request: &CertificateRequest) -> Result<Certificate, RenderError> {
        Err(RenderError::Unavailable("renderer offline".into()))
    }
}

/// A kernel over a fresh [`MemoryStore`] with a manual clock, a recording
/// audit sink and one registered institution.
pub struct ScenarioFixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<RecordingAuditSink>,
    pub kernel: Kernel<MemoryStore>,
    pub institution: Institution,
}

impl ScenarioFixture {
    pub async fn new() -> Self {
        Self::with_config(KernelConfig::default()).await
    }

    pub async fn with_config(config: KernelConfig) -> Self {
        Self::build(config, None).await
    }

    /// Like [`with_config`](Self::with_config) but with a custom renderer.
    pub async fn with_renderer(
        config: KernelConfig,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> Self {
        Self::build(config, Some(renderer)).await
    }

    async fn build(config: KernelConfig, renderer: Option<Arc<dyn CertificateRenderer>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(EPOCH));
        let audit = Arc::new(RecordingAuditSink::forwarding(Arc::new(
            StoreAuditSink::new(store.clone()),
        )));

        let mut builder = Kernel::builder(store.clone())
            .config(config)
            .clock(clock.clone())
            .audit_sink(audit.clone());
        if let Some(renderer) = renderer {
            builder = builder.renderer(renderer);
        }
        let kernel = builder.build();

        let institution = Institution {
            id: InstitutionId::new(),
            name: "University of Buea".into(),
            slug: "ub".into(),
        };
        kernel
            .upsert_institution(&institution)
            .await
            .expect("seed institution");

        Self {
            store,
            clock,
            audit,
            kernel,
            institution,
        }
    }

    pub fn client(&self) -> ClientInfo {
        ClientInfo::new("203.0.113.7", "docseal-tests")
    }

    /// Register `material` for the fixture's institution, expiring in a year.
    pub async fn register(&self, material: &KeyMaterial) -> CryptographicKey {
        let request = NewKey::new(
            self.institution.id,
            material.public_pem(),
            material.algorithm(),
            EPOCH + 365 * DAY_MS,
        );
        self.kernel
            .register_key(request, "registrar")
            .await
            .expect("register key")
    }

    /// Sign `content` with `material` and record it under `key`.
    pub async fn issue(
        &self,
        material: &KeyMaterial,
        key: &CryptographicKey,
        content: &[u8],
    ) -> SignedDocument {
        let hash = DocumentHash::of_content(content);
        self.kernel
            .record_document(NewDocument {
                institution_id: key.institution_id,
                key_id: key.id,
                signature: material.sign(&hash),
                document_hash: hash.to_string(),
                signed_at: None,
            })
            .await
            .expect("record document")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::crypto;

    #[test]
    fn test_key_material_signs_verifiably() {
        for material in [KeyMaterial::p256(), KeyMaterial::p384()] {
            let hash = DocumentHash::of_content(b"transcript");
            let signature = material.sign(&hash);

            assert!(crypto::verify(
                &material.public_pem(),
                hash.message_bytes(),
                &signature
            ));
            assert!(!crypto::verify(
                &material.public_der(),
                hash.message_bytes(),
                &tamper(&signature, 9)
            ));
        }
    }

    #[test]
    fn test_pem_and_der_share_fingerprint() {
        let material = KeyMaterial::p256();
        assert_eq!(
            crypto::fingerprint(&material.public_pem()),
            crypto::fingerprint(&material.public_der())
        );
    }

    #[tokio::test]
    async fn test_recording_sink_injected_failures() {
        let sink = RecordingAuditSink::new();
        sink.fail_next(1);
        let record = docseal_core::AuditEvent::new(
            ActionType::Verify,
            docseal_core::ResourceType::Document,
        )
        .into_record(EPOCH);

        assert!(sink.record(&record).await.is_err());
        assert!(sink.record(&record).await.is_ok());
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_fixture_issues_documents() {
        let fixture = ScenarioFixture::new().await;
        let material = KeyMaterial::p256();
        let key = fixture.register(&material).await;
        let doc = fixture.issue(&material, &key, b"diploma").await;

        assert_eq!(doc.key_id, key.id);
        assert_eq!(fixture.audit.of(ActionType::KeyCreated).len(), 1);
    }
}
