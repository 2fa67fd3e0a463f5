//! Key lifecycle: registration, rotation, revocation and expiry.
//!
//! Every status change goes through the store, which re-checks the key
//! transition table against the persisted row. Audit events are emitted only
//! after the change has committed.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;

use docseal_core::crypto::{self, KeyInfo};
use docseal_core::{
    ActionType, Algorithm, AuditEvent, CryptographicKey, Fingerprint, InstitutionId, KeyFamily,
    KeyId, KeyRotation, KeyStatus, KeyValidation, ResourceType, RotationId, RotationType,
};
use docseal_store::Store;

use crate::audit::Auditor;
use crate::clock::Clock;
use crate::config::KernelConfig;
use crate::error::{or_not_found, KernelError, Result};

/// Actor recorded for changes the system makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// A key submitted for registration.
#[derive(Debug, Clone)]
pub struct NewKey {
    pub institution_id: InstitutionId,
    /// PEM or DER public key material.
    pub public_key: Bytes,
    pub algorithm: Algorithm,
    pub expires_at: i64,
    pub validated_by: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewKey {
    pub fn new(
        institution_id: InstitutionId,
        public_key: impl Into<Bytes>,
        algorithm: Algorithm,
        expires_at: i64,
    ) -> Self {
        Self {
            institution_id,
            public_key: public_key.into(),
            algorithm,
            expires_at,
            validated_by: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// A request to replace a live key with new material.
#[derive(Debug, Clone)]
pub struct RotateKey {
    pub old_key: KeyId,
    pub public_key: Bytes,
    pub rotation_type: RotationType,
    pub reason: String,
    /// Defaults to the old key's expiry.
    pub expires_at: Option<i64>,
}

/// What one expiry sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<KeyId>,
    pub expiring_soon: Vec<KeyId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.expiring_soon.is_empty()
    }
}

/// Ancestry of a key through rotations.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLineage {
    /// The key itself, then each `parent_key` in turn back to the root.
    pub chain: Vec<CryptographicKey>,
    /// Rotation edges where the key is the old or the new side.
    pub rotations: Vec<KeyRotation>,
}

/// Registry and lifecycle manager for institution public keys.
pub struct KeyStore<S: Store> {
    store: Arc<S>,
    auditor: Arc<Auditor>,
    clock: Arc<dyn Clock>,
    config: Arc<KernelConfig>,
}

impl<S: Store> KeyStore<S> {
    pub fn new(
        store: Arc<S>,
        auditor: Arc<Auditor>,
        clock: Arc<dyn Clock>,
        config: Arc<KernelConfig>,
    ) -> Self {
        Self {
            store,
            auditor,
            clock,
            config,
        }
    }

    /// Validate, fingerprint and persist a key as ACTIVE.
    pub async fn register(&self, request: NewKey, actor: &str) -> Result<CryptographicKey> {
        if self
            .store
            .get_institution(&request.institution_id)
            .await?
            .is_none()
        {
            return Err(KernelError::InstitutionNotFound(request.institution_id));
        }

        let info = parse_for(&request.public_key, request.algorithm.family())?;
        let now = self.clock.now_millis();
        let key = CryptographicKey {
            id: KeyId::new(),
            institution_id: request.institution_id,
            fingerprint: crypto::fingerprint(&request.public_key),
            public_key: request.public_key,
            algorithm: request.algorithm,
            key_size: info.bits as u32,
            status: KeyStatus::Active,
            created_at: now,
            expires_at: request.expires_at,
            revoked_at: None,
            revocation_reason: None,
            parent_key: None,
            validation: KeyValidation {
                validated_at: request.validated_by.as_ref().map(|_| now),
                validated_by: request.validated_by,
                metadata: request.metadata,
            },
        };

        self.store.insert_key(&key).await?;
        tracing::info!(
            key_id = %key.id,
            fingerprint = %key.fingerprint,
            algorithm = %key.algorithm,
            "registered key"
        );

        self.auditor
            .emit(
                AuditEvent::new(ActionType::KeyCreated, ResourceType::Key)
                    .actor(actor)
                    .resource(key.id)
                    .details(json!({
                        "fingerprint": key.fingerprint.to_hex(),
                        "algorithm": key.algorithm.as_str(),
                        "institution_id": key.institution_id.to_string(),
                    })),
            )
            .await;

        Ok(key)
    }

    /// Replace a live key. The new key, the old key's ROTATED status and the
    /// lineage edge commit together or not at all.
    pub async fn rotate(&self, request: RotateKey, actor: &str) -> Result<CryptographicKey> {
        let old = self.get(&request.old_key).await?;
        old.status.ensure_transition(KeyStatus::Rotated)?;

        let info = parse_for(&request.public_key, old.algorithm.family())?;
        let now = self.clock.now_millis();
        let new_key = CryptographicKey {
            id: KeyId::new(),
            institution_id: old.institution_id,
            fingerprint: crypto::fingerprint(&request.public_key),
            public_key: request.public_key,
            algorithm: algorithm_for(&info),
            key_size: info.bits as u32,
            status: KeyStatus::Active,
            created_at: now,
            expires_at: request.expires_at.unwrap_or(old.expires_at),
            revoked_at: None,
            revocation_reason: None,
            parent_key: Some(old.id),
            validation: KeyValidation::default(),
        };
        let rotation = KeyRotation {
            id: RotationId::new(),
            old_key: old.id,
            new_key: new_key.id,
            rotation_type: request.rotation_type,
            reason: request.reason,
            actor: actor.to_string(),
            timestamp: now,
        };

        self.store
            .rotate_key(&old.id, &new_key, &rotation)
            .await
            .map_err(|e| or_not_found(e, || KernelError::KeyNotFound(old.id)))?;
        tracing::info!(
            old_key = %old.id,
            new_key = %new_key.id,
            fingerprint = %new_key.fingerprint,
            rotation_type = %rotation.rotation_type,
            "rotated key"
        );

        self.auditor
            .emit(
                AuditEvent::new(ActionType::KeyRotated, ResourceType::Key)
                    .actor(actor)
                    .resource(new_key.id)
                    .details(json!({
                        "old_key": old.id.to_string(),
                        "new_key": new_key.id.to_string(),
                        "rotation_type": rotation.rotation_type.as_str(),
                        "reason": rotation.reason,
                    })),
            )
            .await;

        Ok(new_key)
    }

    /// Permanently revoke a key.
    pub async fn revoke(&self, id: &KeyId, reason: &str, actor: &str) -> Result<CryptographicKey> {
        let now = self.clock.now_millis();
        let key = self
            .store
            .transition_key(id, KeyStatus::Revoked, now, Some(reason))
            .await
            .map_err(|e| or_not_found(e, || KernelError::KeyNotFound(*id)))?;
        tracing::info!(key_id = %key.id, fingerprint = %key.fingerprint, reason, "revoked key");

        self.auditor
            .emit(
                AuditEvent::new(ActionType::KeyRevoked, ResourceType::Key)
                    .actor(actor)
                    .resource(key.id)
                    .details(json!({ "reason": reason })),
            )
            .await;

        Ok(key)
    }

    /// Expire every live key whose expiry has passed and, when configured,
    /// mark keys inside the warning window. Safe to run repeatedly.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let now = self.clock.now_millis();

        let expired = self.store.expire_keys(now).await?;
        let expiring_soon = match self.config.expiring_soon_window_ms {
            Some(window) if window > 0 => self.store.mark_expiring(now, window).await?,
            _ => Vec::new(),
        };

        if !expired.is_empty() || !expiring_soon.is_empty() {
            tracing::info!(
                expired = expired.len(),
                expiring_soon = expiring_soon.len(),
                "key expiry sweep"
            );
        }

        for id in &expired {
            self.auditor
                .emit(
                    AuditEvent::new(ActionType::KeyExpired, ResourceType::Key)
                        .actor(SYSTEM_ACTOR)
                        .resource(id)
                        .details(json!({ "swept_at": now })),
                )
                .await;
        }

        Ok(SweepReport {
            expired,
            expiring_soon,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get(&self, id: &KeyId) -> Result<CryptographicKey> {
        self.store
            .get_key(id)
            .await?
            .ok_or(KernelError::KeyNotFound(*id))
    }

    pub async fn by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<CryptographicKey>> {
        Ok(self.store.get_key_by_fingerprint(fingerprint).await?)
    }

    pub async fn list_for_institution(
        &self,
        institution: &InstitutionId,
    ) -> Result<Vec<CryptographicKey>> {
        Ok(self.store.list_keys(institution).await?)
    }

    pub async fn lineage(&self, id: &KeyId) -> Result<KeyLineage> {
        let key = self.get(id).await?;
        let rotations = self.store.list_rotations(id).await?;

        let mut seen = HashSet::from([key.id]);
        let mut next = key.parent_key;
        let mut chain = vec![key];
        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                tracing::warn!(key_id = %id, parent = %parent_id, "key lineage cycle");
                break;
            }
            let Some(parent) = self.store.get_key(&parent_id).await? else {
                break;
            };
            next = parent.parent_key;
            chain.push(parent);
        }

        Ok(KeyLineage { chain, rotations })
    }
}

/// Parse key material and confirm it belongs to `family`.
fn parse_for(bytes: &[u8], family: KeyFamily) -> Result<KeyInfo> {
    match crypto::inspect(bytes) {
        Some(info) if info.family == family => Ok(info),
        Some(info) => Err(KernelError::Input(format!(
            "public key is {:?}, expected {:?}",
            info.family, family
        ))),
        None => Err(KernelError::Input("unreadable public key".into())),
    }
}

/// Best algorithm label for parsed key material.
fn algorithm_for(info: &KeyInfo) -> Algorithm {
    match info.family {
        KeyFamily::Rsa if info.bits >= 4096 => Algorithm::Rsa4096,
        KeyFamily::Rsa => Algorithm::Rsa2048,
        KeyFamily::Ec if info.bits >= 384 => Algorithm::EcdsaP384,
        KeyFamily::Ec => Algorithm::EcdsaP256,
    }
}
