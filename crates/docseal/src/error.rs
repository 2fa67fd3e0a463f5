//! Error types for the kernel.

use docseal_core::{CoreError, InstitutionId, KeyId, KeyStatus, ReportId, TransitionError};
use docseal_store::StoreError;
use thiserror::Error;

/// Errors that can occur during kernel operations.
///
/// Cryptographic mismatch is not an error: verification reports it as an
/// outcome.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed key, signature or hash; rejected before any mutation.
    #[error("invalid input: {0}")]
    Input(String),

    /// Status change rejected by a transition table.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Fingerprint or document hash collision reported by storage.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    /// The key exists but cannot vouch for new documents.
    #[error("key {key} is {status}, not ACTIVE")]
    KeyNotActive { key: KeyId, status: KeyStatus },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("report not found: {0}")]
    ReportNotFound(ReportId),

    #[error("institution not found: {0}")]
    InstitutionNotFound(InstitutionId),

    /// Transient storage failure; the operation made no changes.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for KernelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateFingerprint(fp) => {
                KernelError::Integrity(format!("key fingerprint {} already registered", fp))
            }
            StoreError::DuplicateDocument(hash) => {
                KernelError::Integrity(format!("document hash {} already recorded", hash))
            }
            StoreError::DuplicateSlug(slug) => {
                KernelError::Integrity(format!("institution slug {} already taken", slug))
            }
            StoreError::Transition(t) => KernelError::Transition(t),
            other => KernelError::Store(other),
        }
    }
}

impl From<CoreError> for KernelError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Transition(t) => KernelError::Transition(t),
            other => KernelError::Input(other.to_string()),
        }
    }
}

/// Map a storage `NotFound` onto the caller's typed not-found error.
pub(crate) fn or_not_found(e: StoreError, not_found: impl FnOnce() -> KernelError) -> KernelError {
    match e {
        StoreError::NotFound(_) => not_found(),
        other => other.into(),
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_classified() {
        let err: KernelError = StoreError::DuplicateFingerprint("ab".into()).into();
        assert!(matches!(err, KernelError::Integrity(_)));

        let err: KernelError = StoreError::DuplicateSlug("ens".into()).into();
        assert!(matches!(err, KernelError::Integrity(_)));

        let err: KernelError = StoreError::Transition(TransitionError::new("key", "A", "B")).into();
        assert!(matches!(err, KernelError::Transition(_)));

        let err: KernelError = StoreError::InvalidData("x".into()).into();
        assert!(matches!(err, KernelError::Store(_)));
    }

    #[test]
    fn test_core_errors_are_input() {
        let err: KernelError = CoreError::InvalidHash("short".into()).into();
        assert!(matches!(err, KernelError::Input(_)));
    }
}
