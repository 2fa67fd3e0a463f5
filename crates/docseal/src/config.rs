//! Kernel configuration.

use serde::Deserialize;

/// Configuration for the Kernel.
///
/// Every field has a default, so hosts can load a partial JSON document:
///
/// ```
/// use docseal::KernelConfig;
///
/// let config = KernelConfig::from_json(r#"{"audit_attempts": 5}"#).unwrap();
/// assert_eq!(config.audit_attempts, 5);
/// assert!(config.issue_certificates);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Base URL embedded in certificates; the hash is appended as `?hash=`.
    pub verify_url_base: String,
    /// Request a certificate on AUTHENTIC when a renderer is configured.
    pub issue_certificates: bool,
    /// Attempts per audit event before giving up with an error log.
    pub audit_attempts: u32,
    /// When set, the expiry sweep also marks ACTIVE keys expiring within
    /// this many milliseconds as EXPIRING_SOON.
    pub expiring_soon_window_ms: Option<i64>,
    /// Check the signature against the key before recording a document.
    pub verify_signature_on_record: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            verify_url_base: "https://letscheck.cm/verify".to_string(),
            issue_certificates: true,
            audit_attempts: 3,
            expiring_soon_window_ms: None,
            verify_signature_on_record: true,
        }
    }
}

impl KernelConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Public URL at which `hash` can be re-verified.
    pub fn verify_url(&self, hash: &str) -> String {
        format!("{}?hash={}", self.verify_url_base.trim_end_matches('/'), hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(KernelConfig::from_json("{}").unwrap(), KernelConfig::default());
    }

    #[test]
    fn test_verify_url() {
        let config = KernelConfig {
            verify_url_base: "https://example.org/verify/".into(),
            ..KernelConfig::default()
        };
        assert_eq!(
            config.verify_url("abc"),
            "https://example.org/verify?hash=abc"
        );
    }

    #[test]
    fn test_window_from_json() {
        let config = KernelConfig::from_json(r#"{"expiring_soon_window_ms": 86400000}"#).unwrap();
        assert_eq!(config.expiring_soon_window_ms, Some(86_400_000));
    }
}
