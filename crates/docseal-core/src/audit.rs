//! Audit records: write-once entries describing what happened to which resource.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::AuditId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Verify,
    Sign,
    Revoke,
    KeyCreated,
    KeyRotated,
    KeyRevoked,
    KeyExpired,
    ReportCreated,
    ReportUpdated,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        ActionType::Verify,
        ActionType::Sign,
        ActionType::Revoke,
        ActionType::KeyCreated,
        ActionType::KeyRotated,
        ActionType::KeyRevoked,
        ActionType::KeyExpired,
        ActionType::ReportCreated,
        ActionType::ReportUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Verify => "VERIFY",
            ActionType::Sign => "SIGN",
            ActionType::Revoke => "REVOKE",
            ActionType::KeyCreated => "KEY_CREATED",
            ActionType::KeyRotated => "KEY_ROTATED",
            ActionType::KeyRevoked => "KEY_REVOKED",
            ActionType::KeyExpired => "KEY_EXPIRED",
            ActionType::ReportCreated => "REPORT_CREATED",
            ActionType::ReportUpdated => "REPORT_UPDATED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "action type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Document,
    Key,
    Report,
    System,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "DOCUMENT",
            ResourceType::Key => "KEY",
            ResourceType::Report => "REPORT",
            ResourceType::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "DOCUMENT" => Ok(ResourceType::Document),
            "KEY" => Ok(ResourceType::Key),
            "REPORT" => Ok(ResourceType::Report),
            "SYSTEM" => Ok(ResourceType::System),
            other => Err(CoreError::UnknownVariant {
                kind: "resource type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event to be audited, before it has an id or timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Option<String>,
    pub action_type: ActionType,
    pub resource_type: ResourceType,
    /// Stringified id of the resource, when one exists.
    pub resource_id: Option<String>,
    pub ip: String,
    pub user_agent: String,
    pub success: bool,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action_type: ActionType, resource_type: ResourceType) -> Self {
        Self {
            actor: None,
            action_type,
            resource_type,
            resource_id: None,
            ip: String::new(),
            user_agent: String::new(),
            success: true,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn resource(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn client(mut self, ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip = ip.into();
        self.user_agent = user_agent.into();
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Stamp the event, producing the immutable record.
    pub fn into_record(self, timestamp: i64) -> AuditRecord {
        AuditRecord {
            id: AuditId::new(),
            event: self,
            timestamp,
        }
    }
}

/// A persisted audit entry. There is no API to change one once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    #[serde(flatten)]
    pub event: AuditEvent,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder() {
        let record = AuditEvent::new(ActionType::Verify, ResourceType::Document)
            .resource("doc-1")
            .client("203.0.113.7", "curl/8")
            .success(false)
            .details(json!({"result": "NOT_FOUND"}))
            .into_record(42);

        assert_eq!(record.timestamp, 42);
        assert_eq!(record.event.resource_id.as_deref(), Some("doc-1"));
        assert!(!record.event.success);
        assert_eq!(record.event.details["result"], "NOT_FOUND");
    }

    #[test]
    fn test_action_type_parse_roundtrip() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::parse(action.as_str()).unwrap(), action);
        }
    }
}
