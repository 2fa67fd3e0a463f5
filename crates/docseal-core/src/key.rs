//! Registered public keys, their lifecycle and rotation lineage.
//!
//! A key moves through a closed set of statuses. The allowed moves live in
//! [`KeyStatus::can_transition_to`]; every mutator, in memory or in storage,
//! goes through it.
//!
//! ```text
//! ACTIVE ──> EXPIRING_SOON ──> EXPIRED
//!   │              │
//!   ├──────────────┴─────────> REVOKED
//!   └──────────────┴─────────> ROTATED
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{Algorithm, Fingerprint};
use crate::error::{CoreError, TransitionError};
use crate::types::{InstitutionId, KeyId, RotationId};

/// Lifecycle status of a registered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
    Rotated,
}

impl KeyStatus {
    pub const ALL: [KeyStatus; 5] = [
        KeyStatus::Active,
        KeyStatus::ExpiringSoon,
        KeyStatus::Expired,
        KeyStatus::Revoked,
        KeyStatus::Rotated,
    ];

    /// Statuses from which a key can still be rotated, revoked or expired.
    pub const LIVE: [KeyStatus; 2] = [KeyStatus::Active, KeyStatus::ExpiringSoon];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "ACTIVE",
            KeyStatus::ExpiringSoon => "EXPIRING_SOON",
            KeyStatus::Expired => "EXPIRED",
            KeyStatus::Revoked => "REVOKED",
            KeyStatus::Rotated => "ROTATED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "key status",
                value: s.to_string(),
            })
    }

    /// The allowed-transition table.
    pub fn can_transition_to(self, next: KeyStatus) -> bool {
        use KeyStatus::*;
        matches!(
            (self, next),
            (Active, ExpiringSoon | Expired | Revoked | Rotated)
                | (ExpiringSoon, Expired | Rotated)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        Self::ALL.iter().all(|&next| !self.can_transition_to(next))
    }

    /// Check a transition, producing the error every mutator reports.
    pub fn ensure_transition(self, next: KeyStatus) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError::new("key", self, next))
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who validated a key and when, plus free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValidation {
    pub validated_by: Option<String>,
    pub validated_at: Option<i64>,
    pub metadata: serde_json::Value,
}

/// A registered institution public key. Private keys never reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptographicKey {
    pub id: KeyId,
    pub institution_id: InstitutionId,
    /// Key material exactly as submitted (PEM or DER).
    pub public_key: Bytes,
    pub fingerprint: Fingerprint,
    pub algorithm: Algorithm,
    /// Size in bits as parsed from the key material.
    pub key_size: u32,
    pub status: KeyStatus,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
    pub revocation_reason: Option<String>,
    /// Weak lineage reference: the key this one replaced, resolved by lookup.
    pub parent_key: Option<KeyId>,
    pub validation: KeyValidation,
}

impl CryptographicKey {
    /// Only ACTIVE keys vouch for signatures.
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    pub fn is_past_expiry(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Apply a status transition in place.
    ///
    /// Revocation data is recorded only when moving to REVOKED.
    pub fn transition(
        &mut self,
        next: KeyStatus,
        at: i64,
        reason: Option<&str>,
    ) -> Result<(), TransitionError> {
        self.status.ensure_transition(next)?;
        self.status = next;
        if next == KeyStatus::Revoked {
            self.revoked_at = Some(at);
            self.revocation_reason = reason.map(str::to_string);
        }
        Ok(())
    }
}

/// Why a key was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationType {
    Scheduled,
    Manual,
    Security,
    Compromised,
}

impl RotationType {
    pub const ALL: [RotationType; 4] = [
        RotationType::Scheduled,
        RotationType::Manual,
        RotationType::Security,
        RotationType::Compromised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationType::Scheduled => "SCHEDULED",
            RotationType::Manual => "MANUAL",
            RotationType::Security => "SECURITY",
            RotationType::Compromised => "COMPROMISED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|rt| rt.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "rotation type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for RotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only edge in the key lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRotation {
    pub id: RotationId,
    pub old_key: KeyId,
    pub new_key: KeyId,
    pub rotation_type: RotationType,
    pub reason: String,
    pub actor: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_never_reenter_active() {
        for status in [KeyStatus::Expired, KeyStatus::Revoked, KeyStatus::Rotated] {
            assert!(status.is_terminal());
            assert!(!status.can_transition_to(KeyStatus::Active));
        }
    }

    #[test]
    fn test_live_states() {
        assert!(!KeyStatus::Active.is_terminal());
        assert!(!KeyStatus::ExpiringSoon.is_terminal());
        assert!(KeyStatus::Active.can_transition_to(KeyStatus::Rotated));
        assert!(KeyStatus::ExpiringSoon.can_transition_to(KeyStatus::Expired));
        assert!(!KeyStatus::ExpiringSoon.can_transition_to(KeyStatus::Active));
        assert!(!KeyStatus::Active.can_transition_to(KeyStatus::Active));
    }

    #[test]
    fn test_only_active_keys_can_be_revoked() {
        for status in KeyStatus::ALL {
            assert_eq!(
                status.can_transition_to(KeyStatus::Revoked),
                status == KeyStatus::Active,
                "{} -> REVOKED",
                status
            );
        }
        let err = KeyStatus::ExpiringSoon
            .ensure_transition(KeyStatus::Revoked)
            .unwrap_err();
        assert_eq!(err.from, "EXPIRING_SOON");
    }

    #[test]
    fn test_transition_error_message() {
        let err = KeyStatus::Revoked
            .ensure_transition(KeyStatus::Rotated)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid key transition: REVOKED -> ROTATED");
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in KeyStatus::ALL {
            assert_eq!(KeyStatus::parse(status.as_str()).unwrap(), status);
        }
        for rt in RotationType::ALL {
            assert_eq!(RotationType::parse(rt.as_str()).unwrap(), rt);
        }
    }

    #[test]
    fn test_transition_records_revocation() {
        let mut key = CryptographicKey {
            id: KeyId::new(),
            institution_id: InstitutionId::new(),
            public_key: Bytes::from_static(b"pem"),
            fingerprint: Fingerprint([1; 32]),
            algorithm: Algorithm::EcdsaP256,
            key_size: 256,
            status: KeyStatus::Active,
            created_at: 0,
            expires_at: 10,
            revoked_at: None,
            revocation_reason: None,
            parent_key: None,
            validation: KeyValidation::default(),
        };

        key.transition(KeyStatus::Revoked, 5, Some("leaked")).unwrap();
        assert_eq!(key.revoked_at, Some(5));
        assert_eq!(key.revocation_reason.as_deref(), Some("leaked"));
        assert!(key.transition(KeyStatus::Active, 6, None).is_err());
        assert_eq!(key.status, KeyStatus::Revoked);
    }
}
