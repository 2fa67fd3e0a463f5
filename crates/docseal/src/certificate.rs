//! Verification certificates for AUTHENTIC documents.
//!
//! The kernel only asks for a certificate; PDF layout and QR imaging belong
//! to whatever renderer the host plugs in.

use async_trait::async_trait;
use bytes::Bytes;
use docseal_core::{DocumentHash, VerificationId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("certificate encoding failed: {0}")]
    Encoding(String),

    #[error("certificate renderer unavailable: {0}")]
    Unavailable(String),
}

/// Everything a renderer needs to draw a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateRequest {
    pub verification_id: VerificationId,
    pub document_hash: DocumentHash,
    pub institution_name: String,
    pub signed_at: i64,
    pub verified_at: i64,
    /// URL a QR code on the certificate should point to.
    pub verify_url: String,
}

/// A rendered certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub verification_id: VerificationId,
    pub content_type: String,
    pub filename: String,
    pub body: Bytes,
}

#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, request: &CertificateRequest) -> Result<Certificate, RenderError>;
}

/// Renders a JSON receipt carrying the verification URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCertificateRenderer;

#[derive(Serialize)]
struct JsonCertificate<'a> {
    result: &'static str,
    #[serde(flatten)]
    request: &'a CertificateRequest,
}

#[async_trait]
impl CertificateRenderer for JsonCertificateRenderer {
    async fn render(&self, request: &CertificateRequest) -> Result<Certificate, RenderError> {
        let body = serde_json::to_vec_pretty(&JsonCertificate {
            result: "AUTHENTIC",
            request,
        })
        .map_err(|e| RenderError::Encoding(e.to_string()))?;

        Ok(Certificate {
            verification_id: request.verification_id,
            content_type: "application/json".to_string(),
            filename: format!("certificate-{}.json", &request.document_hash.as_str()[..10]),
            body: Bytes::from(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_certificate() {
        let hash = DocumentHash::of_content(b"diploma");
        let request = CertificateRequest {
            verification_id: VerificationId::new(),
            document_hash: hash.clone(),
            institution_name: "University of Buea".into(),
            signed_at: 1_700_000_000_000,
            verified_at: 1_700_000_500_000,
            verify_url: format!("https://letscheck.cm/verify?hash={}", hash),
        };

        let cert = JsonCertificateRenderer.render(&request).await.unwrap();
        assert_eq!(cert.content_type, "application/json");
        assert!(cert.filename.starts_with("certificate-"));

        let json: serde_json::Value = serde_json::from_slice(&cert.body).unwrap();
        assert_eq!(json["result"], "AUTHENTIC");
        assert_eq!(json["document_hash"], hash.as_str());
        assert_eq!(json["verify_url"], request.verify_url);
        assert_eq!(json["verification_id"], request.verification_id.to_string());
    }
}
