//! Audit emission.
//!
//! Services hand events to an [`Auditor`], which stamps them and delivers
//! them to an [`AuditSink`] with bounded retries. Audit failures are logged
//! and never fail the operation that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use docseal_core::{AuditEvent, AuditRecord};
use docseal_store::{Store, StoreError};
use thiserror::Error;

use crate::clock::Clock;

/// Failure to persist an audit record.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Appends records to the store's audit table.
pub struct StoreAuditSink<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StoreAuditSink<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Store + 'static> AuditSink for StoreAuditSink<S> {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.store.append_audit(record).await?;
        Ok(())
    }
}

/// Emits each record as a structured `tracing` event at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let event = &record.event;
        tracing::info!(
            target: "docseal::audit",
            audit_id = %record.id,
            action = %event.action_type,
            resource_type = %event.resource_type,
            resource_id = event.resource_id.as_deref().unwrap_or(""),
            actor = event.actor.as_deref().unwrap_or(""),
            ip = %event.ip,
            success = event.success,
            details = %event.details,
            timestamp = record.timestamp,
            "audit"
        );
        Ok(())
    }
}

/// Stamps events and delivers them to the sink.
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    attempts: u32,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>, attempts: u32) -> Self {
        Self {
            sink,
            clock,
            attempts: attempts.max(1),
        }
    }

    /// Deliver one event. Returns whether the sink accepted it.
    pub async fn emit(&self, event: AuditEvent) -> bool {
        let record = event.into_record(self.clock.now_millis());

        for attempt in 1..=self.attempts {
            match self.sink.record(&record).await {
                Ok(()) => return true,
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(
                        attempt,
                        audit_id = %record.id,
                        action = %record.event.action_type,
                        error = %e,
                        "audit sink failed, retrying"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        attempts = self.attempts,
                        audit_id = %record.id,
                        action = %record.event.action_type,
                        resource_id = record.event.resource_id.as_deref().unwrap_or(""),
                        details = %record.event.details,
                        error = %e,
                        "audit record lost"
                    );
                }
            }
        }
        false
    }
}
