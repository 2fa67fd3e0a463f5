//! Suspicious-document reports filed by the public.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, TransitionError};
use crate::types::{DocumentHash, DocumentId, ReportId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Fake,
    Altered,
    Unauthorized,
    Other,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Fake,
        ReportType::Altered,
        ReportType::Unauthorized,
        ReportType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Fake => "FAKE",
            ReportType::Altered => "ALTERED",
            ReportType::Unauthorized => "UNAUTHORIZED",
            ReportType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "report type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pending,
        ReportStatus::Investigating,
        ReportStatus::Resolved,
        ReportStatus::Dismissed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Investigating => "INVESTIGATING",
            ReportStatus::Resolved => "RESOLVED",
            ReportStatus::Dismissed => "DISMISSED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "report status",
                value: s.to_string(),
            })
    }

    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, Investigating | Resolved | Dismissed) | (Investigating, Resolved | Dismissed)
        )
    }

    pub fn ensure_transition(self, next: ReportStatus) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError::new("report", self, next))
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional contact details left by whoever filed a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterContact {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousReport {
    pub id: ReportId,
    /// Set when the hash matched a known document at filing time.
    pub document_id: Option<DocumentId>,
    pub document_hash: DocumentHash,
    pub report_type: ReportType,
    pub reason: String,
    pub status: ReportStatus,
    pub reporter: ReporterContact,
    pub created_at: i64,
}
