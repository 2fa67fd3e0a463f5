//! Signed documents and the issuing institutions they name.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, TransitionError};
use crate::types::{DocumentHash, DocumentId, InstitutionId, KeyId};

/// Status of a signed document. Revocation is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Authentic,
    Revoked,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Authentic => "AUTHENTIC",
            DocumentStatus::Revoked => "REVOKED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "AUTHENTIC" => Ok(DocumentStatus::Authentic),
            "REVOKED" => Ok(DocumentStatus::Revoked),
            other => Err(CoreError::UnknownVariant {
                kind: "document status",
                value: other.to_string(),
            }),
        }
    }

    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Authentic, DocumentStatus::Revoked)
        )
    }

    pub fn ensure_transition(self, next: DocumentStatus) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError::new("document", self, next))
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document signed upstream by an institution.
///
/// `key_id` is the key that was ACTIVE when the document was signed; the
/// signature is always checked against that key, whatever the institution
/// uses today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    pub id: DocumentId,
    pub institution_id: InstitutionId,
    pub key_id: KeyId,
    pub document_hash: DocumentHash,
    pub signature: Bytes,
    pub status: DocumentStatus,
    pub signed_at: i64,
    pub revoked_at: Option<i64>,
    pub revocation_reason: Option<String>,
}

impl SignedDocument {
    pub fn is_revoked(&self) -> bool {
        self.status == DocumentStatus::Revoked
    }

    pub fn revoke(&mut self, at: i64, reason: &str) -> Result<(), TransitionError> {
        self.status.ensure_transition(DocumentStatus::Revoked)?;
        self.status = DocumentStatus::Revoked;
        self.revoked_at = Some(at);
        self.revocation_reason = Some(reason.to_string());
        Ok(())
    }
}

/// Read-side reference to an issuing institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: InstitutionId,
    pub name: String,
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> SignedDocument {
        SignedDocument {
            id: DocumentId::new(),
            institution_id: InstitutionId::new(),
            key_id: KeyId::new(),
            document_hash: DocumentHash::of_content(b"transcript"),
            signature: Bytes::from_static(b"sig"),
            status: DocumentStatus::Authentic,
            signed_at: 100,
            revoked_at: None,
            revocation_reason: None,
        }
    }

    #[test]
    fn test_revoke_is_one_way() {
        let mut doc = document();
        doc.revoke(200, "fraud").unwrap();
        assert!(doc.is_revoked());
        assert_eq!(doc.revocation_reason.as_deref(), Some("fraud"));

        let err = doc.revoke(300, "again").unwrap_err();
        assert_eq!(err.entity, "document");
        assert_eq!(doc.revoked_at, Some(200));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(DocumentStatus::parse("REVOKED").unwrap(), DocumentStatus::Revoked);
        assert!(DocumentStatus::parse("FORGED").is_err());
    }
}
