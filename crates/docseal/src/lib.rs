//! # DocSeal
//!
//! Authenticity verification for institution-signed documents.
//!
//! ## Overview
//!
//! Institutions sign the SHA-256 hash of each document they issue and
//! register their public keys here. Anyone holding a document can then ask
//! whether its hash is authentic:
//!
//! - **Keys**: RSA or EC public keys with a closed lifecycle
//!   (ACTIVE, EXPIRING_SOON, EXPIRED, REVOKED, ROTATED)
//! - **Documents**: one signed record per hash, revocable once
//! - **Verification**: a fixed ladder ending in one of six outcomes, each
//!   audited
//! - **Reports**: suspicious-document reports with their own triage states
//!
//! ## Key Concepts
//!
//! - **Fingerprint**: SHA-256 over the canonical key encoding; globally unique.
//! - **Rotation**: atomic replacement of a key, leaving a lineage edge.
//! - **Monotonicity**: a document signed by a REVOKED or ROTATED key never
//!   verifies as AUTHENTIC again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docseal::{ClientInfo, Kernel, KernelConfig};
//! use docseal::store::SqliteStore;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let store = SqliteStore::open("docseal.db")?;
//!     let kernel = Kernel::new(store, KernelConfig::default());
//!
//!     let result = kernel
//!         .verify(
//!             "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
//!             &ClientInfo::new("203.0.113.9", "curl/8.0"),
//!         )
//!         .await?;
//!     println!("{}", result.outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `docseal::core` - data model, status tables and signature checks
//! - `docseal::store` - storage abstraction, SQLite and in-memory backends

pub mod audit;
pub mod certificate;
pub mod clock;
pub mod config;
pub mod documents;
pub mod error;
pub mod kernel;
pub mod keys;
pub mod reports;
pub mod verify;

// Re-export component crates
pub use docseal_core as core;
pub use docseal_store as store;

// Re-export main types for convenience
pub use audit::{AuditError, AuditSink, Auditor, StoreAuditSink, TracingAuditSink};
pub use certificate::{
    Certificate, CertificateRenderer, CertificateRequest, JsonCertificateRenderer, RenderError,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KernelConfig;
pub use documents::{DocumentRegistry, DocumentSummary, NewDocument};
pub use error::{KernelError, Result};
pub use kernel::{Kernel, KernelBuilder, PublicStats};
pub use keys::{KeyLineage, KeyStore, NewKey, RotateKey, SweepReport, SYSTEM_ACTOR};
pub use reports::{NewReport, ReportDesk};
pub use verify::{
    ClientInfo, Revocation, Verification, VerificationOrchestrator, VerificationOutcome,
};

// Re-export commonly used core types
pub use docseal_core::{
    Algorithm, CryptographicKey, DocumentHash, DocumentId, DocumentStatus, Fingerprint,
    Institution, InstitutionId, KeyId, KeyStatus, ReportId, ReportStatus, ReportType,
    RotationType, SignedDocument, SuspiciousReport,
};
