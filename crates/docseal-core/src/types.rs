//! Strong type definitions for DocSeal.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Rebuild from the raw 16 bytes.
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 16] = slice.try_into()?;
                Ok(Self::from_bytes(arr))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an institution that owns signing keys.
    InstitutionId
);
uuid_id!(
    /// Identifier of a registered public key.
    KeyId
);
uuid_id!(
    /// Identifier of a signed document record.
    DocumentId
);
uuid_id!(
    /// Identifier of a key rotation edge.
    RotationId
);
uuid_id!(
    /// Identifier of a suspicious-document report.
    ReportId
);
uuid_id!(
    /// Identifier of an audit record.
    AuditId
);
uuid_id!(
    /// Correlation token minted for each verification call.
    ///
    /// Handed to clients for receipts and certificates; never stored as history.
    VerificationId
);

/// Number of hex characters in a document hash (a SHA-256 digest).
pub const DOCUMENT_HASH_HEX_LEN: usize = 64;

/// Content-addressed document identifier: the hex SHA-256 of the document.
///
/// Always stored lowercase. The signed message for a document is the UTF-8
/// encoding of this string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentHash(String);

impl DocumentHash {
    /// Parse and normalise a hex document hash.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        if trimmed.len() != DOCUMENT_HASH_HEX_LEN {
            return Err(CoreError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                DOCUMENT_HASH_HEX_LEN,
                trimmed.len()
            )));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidHash("non-hex character".into()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Hash arbitrary document content.
    pub fn of_content(content: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        Self(hex::encode(Sha256::digest(content)))
    }

    /// The lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bytes an upstream signer signs for this document.
    pub fn message_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentHash({})", &self.0[..16])
    }
}

impl fmt::Display for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentHash {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DocumentHash> for String {
    fn from(h: DocumentHash) -> Self {
        h.0
    }
}

impl std::str::FromStr for DocumentHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_hash_normalises_case() {
        let upper = "AB".repeat(32);
        let hash = DocumentHash::parse(&upper).unwrap();
        assert_eq!(hash.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_document_hash_rejects_bad_input() {
        assert!(DocumentHash::parse("abc").is_err());
        assert!(DocumentHash::parse(&"zz".repeat(32)).is_err());
        assert!(DocumentHash::parse("").is_err());
    }

    #[test]
    fn test_document_hash_of_content() {
        let hash = DocumentHash::of_content(b"diploma.pdf bytes");
        assert_eq!(hash.as_str().len(), DOCUMENT_HASH_HEX_LEN);
        assert_eq!(hash, DocumentHash::of_content(b"diploma.pdf bytes"));
    }

    #[test]
    fn test_id_bytes_roundtrip() {
        let id = KeyId::new();
        let recovered = KeyId::try_from(&id.as_bytes()[..]).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(VerificationId::new(), VerificationId::new());
    }
}
