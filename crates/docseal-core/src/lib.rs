//! # DocSeal Core
//!
//! Pure primitives for DocSeal: public keys, signed documents, reports,
//! audit records and signature verification.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over key material and status tables.
//!
//! ## Key Types
//!
//! - [`CryptographicKey`] - A registered institution public key
//! - [`SignedDocument`] - A document signed upstream, looked up by [`DocumentHash`]
//! - [`KeyStatus`], [`DocumentStatus`], [`ReportStatus`] - Closed lifecycles with
//!   explicit transition tables
//! - [`Fingerprint`] - SHA-256 of a canonically encoded public key
//!
//! ## Verification
//!
//! See the [`crypto`] module: RSA-PSS and ECDSA checks that never error, only
//! answer.

pub mod audit;
pub mod crypto;
pub mod document;
pub mod error;
pub mod key;
pub mod report;
pub mod types;

pub use audit::{ActionType, AuditEvent, AuditRecord, ResourceType};
pub use crypto::{Algorithm, Fingerprint, KeyFamily, KeyInfo, SignatureCheck};
pub use document::{DocumentStatus, Institution, SignedDocument};
pub use error::{CoreError, TransitionError};
pub use key::{CryptographicKey, KeyRotation, KeyStatus, KeyValidation, RotationType};
pub use report::{ReportStatus, ReportType, ReporterContact, SuspiciousReport};
pub use types::{
    AuditId, DocumentHash, DocumentId, InstitutionId, KeyId, ReportId, RotationId,
    VerificationId,
};
