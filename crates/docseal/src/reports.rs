//! Suspicious-document reports.

use std::sync::Arc;

use serde_json::json;

use docseal_core::{
    ActionType, AuditEvent, DocumentHash, ReportId, ReportStatus, ReportType, ReporterContact,
    ResourceType, SuspiciousReport,
};
use docseal_store::Store;

use crate::audit::Auditor;
use crate::clock::Clock;
use crate::error::{or_not_found, KernelError, Result};

#[derive(Debug, Clone)]
pub struct NewReport {
    pub document_hash: String,
    pub report_type: ReportType,
    pub reason: String,
    pub reporter: ReporterContact,
}

pub struct ReportDesk<S: Store> {
    store: Arc<S>,
    auditor: Arc<Auditor>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> ReportDesk<S> {
    pub fn new(store: Arc<S>, auditor: Arc<Auditor>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            auditor,
            clock,
        }
    }

    /// File a report. Unknown hashes are accepted; known ones are linked.
    pub async fn submit(&self, request: NewReport) -> Result<SuspiciousReport> {
        let document_hash = DocumentHash::parse(&request.document_hash)?;
        if request.reason.trim().is_empty() {
            return Err(KernelError::Input("report reason is empty".into()));
        }

        let document_id = self
            .store
            .get_document_by_hash(&document_hash)
            .await?
            .map(|d| d.id);
        let report = SuspiciousReport {
            id: ReportId::new(),
            document_id,
            document_hash,
            report_type: request.report_type,
            reason: request.reason,
            status: ReportStatus::Pending,
            reporter: request.reporter,
            created_at: self.clock.now_millis(),
        };

        self.store.insert_report(&report).await?;
        tracing::info!(
            report_id = %report.id,
            report_type = %report.report_type,
            linked = report.document_id.is_some(),
            "report submitted"
        );

        let mut event = AuditEvent::new(ActionType::ReportCreated, ResourceType::Report)
            .resource(report.id)
            .details(json!({
                "document_hash": report.document_hash.as_str(),
                "report_type": report.report_type.as_str(),
            }));
        if let Some(email) = &report.reporter.email {
            event = event.actor(email.clone());
        }
        self.auditor.emit(event).await;

        Ok(report)
    }

    pub async fn get(&self, id: &ReportId) -> Result<SuspiciousReport> {
        self.store
            .get_report(id)
            .await?
            .ok_or(KernelError::ReportNotFound(*id))
    }

    pub async fn set_status(
        &self,
        id: &ReportId,
        status: ReportStatus,
        actor: &str,
    ) -> Result<SuspiciousReport> {
        let before = self.get(id).await?.status;
        let report = self
            .store
            .update_report_status(id, status)
            .await
            .map_err(|e| or_not_found(e, || KernelError::ReportNotFound(*id)))?;

        self.auditor
            .emit(
                AuditEvent::new(ActionType::ReportUpdated, ResourceType::Report)
                    .actor(actor)
                    .resource(report.id)
                    .details(json!({
                        "from": before.as_str(),
                        "to": report.status.as_str(),
                    })),
            )
            .await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::StoreAuditSink;
    use crate::clock::ManualClock;
    use docseal_store::{AuditQuery, MemoryStore};

    fn desk() -> (ReportDesk<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let auditor = Arc::new(Auditor::new(
            Arc::new(StoreAuditSink::new(store.clone())),
            clock.clone(),
            1,
        ));
        (ReportDesk::new(store.clone(), auditor, clock), store)
    }

    fn new_report(hash: &DocumentHash) -> NewReport {
        NewReport {
            document_hash: hash.to_string(),
            report_type: ReportType::Altered,
            reason: "grades changed".into(),
            reporter: ReporterContact::default(),
        }
    }

    #[tokio::test]
    async fn test_submit_unknown_hash_is_pending_and_unlinked() {
        let (desk, store) = desk();
        let report = desk
            .submit(new_report(&DocumentHash::of_content(b"nope")))
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Pending);
        assert!(report.document_id.is_none());
        assert_eq!(
            store
                .list_audit(&AuditQuery::action(ActionType::ReportCreated))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_status_table_enforced() {
        let (desk, store) = desk();
        let report = desk
            .submit(new_report(&DocumentHash::of_content(b"doc")))
            .await
            .unwrap();

        desk.set_status(&report.id, ReportStatus::Dismissed, "moderator")
            .await
            .unwrap();
        let err = desk
            .set_status(&report.id, ReportStatus::Investigating, "moderator")
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Transition(_)));

        let updates = store
            .list_audit(&AuditQuery::action(ActionType::ReportUpdated))
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].event.details["to"], "DISMISSED");
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_hash() {
        let (desk, _) = desk();
        let mut request = new_report(&DocumentHash::of_content(b"doc"));
        request.document_hash = "xyz".into();
        assert!(matches!(
            desk.submit(request).await.unwrap_err(),
            KernelError::Input(_)
        ));
    }
}
