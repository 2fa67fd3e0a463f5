//! Error types for DocSeal core.

use thiserror::Error;

/// Core errors raised while building domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("invalid document hash: {0}")]
    InvalidHash(String),

    #[error("unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// A status change that the allowed-transition table forbids.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {entity} transition: {from} -> {to}")]
pub struct TransitionError {
    /// Which lifecycle was violated ("key", "document", "report").
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        Self {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
