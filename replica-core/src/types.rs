//! Domain types for replica synchronization.
//!
//! Both types are plain values: a [`SyncStatus`] is built whole and swapped
//! into the [`crate::StatusStore`], a [`VerificationReport`] is handed to the
//! caller and never stored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message carried by the placeholder status before any attempt has run.
pub const NO_SYNC_MESSAGE: &str = "No sync attempted yet";

/// Message recorded by the verifier when the round-trip query does not
/// return the expected constant.
pub const TEST_QUERY_FAILED: &str = "Test query failed";

// ---------------------------------------------------------------------------
// SyncStatus
// ---------------------------------------------------------------------------

/// Outcome of the most recent sync attempt.
///
/// `duration` is only ever present on success; failure statuses omit the
/// field entirely when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub timestamp: Option<DateTime<Utc>>,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl SyncStatus {
    /// The "no sync attempted yet" placeholder.
    pub fn initial() -> Self {
        Self {
            timestamp: None,
            success: false,
            message: NO_SYNC_MESSAGE.to_string(),
            duration: None,
        }
    }

    /// A successful attempt that took `duration_secs` (already rounded).
    pub fn succeeded(at: DateTime<Utc>, duration_secs: f64) -> Self {
        Self {
            timestamp: Some(at),
            success: true,
            message: format!("Sync completed successfully in {duration_secs}s"),
            duration: Some(duration_secs),
        }
    }

    /// A failed attempt. `cause` is rendered into the message verbatim.
    pub fn failed(at: DateTime<Utc>, cause: impl fmt::Display) -> Self {
        Self {
            timestamp: Some(at),
            success: false,
            message: format!("Error syncing with Turso: {cause}"),
            duration: None,
        }
    }

    /// True until the first attempt has been recorded.
    pub fn is_placeholder(&self) -> bool {
        self.timestamp.is_none()
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::initial()
    }
}

/// Round elapsed seconds to two decimals, the precision statuses report.
pub fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// VerificationReport
// ---------------------------------------------------------------------------

/// Result of one out-of-band verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: DateTime<Utc>,
    pub connection_valid: bool,
    pub test_query_success: bool,
    pub sync_attempted: bool,
    pub sync_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationReport {
    /// Connecting to the replica failed; nothing else was tried.
    pub fn connection_failed(at: DateTime<Utc>, cause: impl fmt::Display) -> Self {
        Self {
            timestamp: at,
            connection_valid: false,
            test_query_success: false,
            sync_attempted: false,
            sync_success: false,
            error: Some(cause.to_string()),
        }
    }

    /// Connected, but the round-trip query failed or returned the wrong value.
    pub fn query_failed(at: DateTime<Utc>, detail: Option<String>) -> Self {
        let error = match detail {
            Some(detail) => format!("{TEST_QUERY_FAILED}: {detail}"),
            None => TEST_QUERY_FAILED.to_string(),
        };
        Self {
            timestamp: at,
            connection_valid: true,
            test_query_success: false,
            sync_attempted: false,
            sync_success: false,
            error: Some(error),
        }
    }

    /// Connected and queried; the sync step ran with the given outcome.
    pub fn sync_attempted(at: DateTime<Utc>, sync_error: Option<String>) -> Self {
        Self {
            timestamp: at,
            connection_valid: true,
            test_query_success: true,
            sync_attempted: true,
            sync_success: sync_error.is_none(),
            error: sync_error,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connection_valid && self.sync_success
    }

    /// Each failed stage, in pipeline order. Empty when healthy.
    pub fn issues(&self) -> Vec<VerificationIssue> {
        if self.is_healthy() {
            return Vec::new();
        }
        let mut issues = Vec::new();
        if !self.connection_valid {
            issues.push(VerificationIssue::ConnectionFailed);
        }
        if !self.test_query_success {
            issues.push(VerificationIssue::QueryFailed);
        }
        if !self.sync_success {
            issues.push(VerificationIssue::SyncFailed);
        }
        issues
    }
}

/// One failed stage of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationIssue {
    ConnectionFailed,
    QueryFailed,
    SyncFailed,
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VerificationIssue::ConnectionFailed => "Cannot connect to Turso DB",
            VerificationIssue::QueryFailed => "Test query failed",
            VerificationIssue::SyncFailed => "Synchronization failed",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_message_carries_rounded_duration() {
        let status = SyncStatus::succeeded(Utc::now(), round_secs(1.234_9));
        assert!(status.success);
        assert_eq!(status.duration, Some(1.23));
        assert_eq!(status.message, "Sync completed successfully in 1.23s");
    }

    #[test]
    fn failure_omits_duration_when_serialized() {
        let status = SyncStatus::failed(Utc::now(), "connection refused");
        assert_eq!(status.message, "Error syncing with Turso: connection refused");
        let json = serde_json::to_value(&status).expect("serialize");
        assert!(json.get("duration").is_none(), "got: {json}");
        assert_eq!(json["success"], serde_json::Value::Bool(false));
    }

    #[test]
    fn placeholder_has_no_timestamp() {
        let status = SyncStatus::default();
        assert!(status.is_placeholder());
        assert_eq!(status.message, NO_SYNC_MESSAGE);
    }

    #[test]
    fn issues_list_every_failed_stage_on_disconnect() {
        let report = VerificationReport::connection_failed(Utc::now(), "refused");
        assert_eq!(
            report.issues(),
            vec![
                VerificationIssue::ConnectionFailed,
                VerificationIssue::QueryFailed,
                VerificationIssue::SyncFailed,
            ]
        );
    }

    #[test]
    fn healthy_report_has_no_issues() {
        let report = VerificationReport::sync_attempted(Utc::now(), None);
        assert!(report.is_healthy());
        assert!(report.issues().is_empty());
        assert!(report.error.is_none());
    }
}
