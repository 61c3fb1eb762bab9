//! Error types for the migration core.
//!
//! Errors are layered the same way the remote calls are:
//!
//! - [`RemoteError`] is what the destination collaborator reports for a single call.
//! - [`ClassifiedError`] pairs a remote error with the [`ErrorCategory`] the classifier assigned.
//! - [`RetryError`] is the outcome of a [`RetryExecutor`](crate::resilience::RetryExecutor) run.
//! - [`MigrationError`] is surfaced by the reconciler, row loader and orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::resilience::ErrorCategory;

/// Network-level failure kinds reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionReset,
    ConnectionRefused,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::ConnectionReset => write!(f, "connection reset"),
            NetworkErrorKind::ConnectionRefused => write!(f, "connection refused"),
            NetworkErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Failure of a single call against the destination platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport failed before a status was received
    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// A resource with the same name already exists in the target scope
    #[error("Duplicate name '{name}': {message}")]
    DuplicateName { name: String, message: String },

    /// Schema or validation failure reported by the remote system
    #[error("Remote validation failed: {message}")]
    Validation { message: String },
}

/// Error body shape returned by the destination API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl RemoteError {
    /// Build a status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Build a network error
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    /// Build a duplicate-name error
    pub fn duplicate(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::DuplicateName {
            message: format!("a resource named '{name}' already exists"),
            name,
        }
    }

    /// Status-code-like discriminator for this error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::DuplicateName { .. } | RemoteError::Validation { .. } => Some(400),
            RemoteError::Network { .. } => None,
        }
    }

    /// Map a raw HTTP failure into the canonical error shape.
    ///
    /// `name` is the resource name the request was about, used when the body reports a
    /// duplicate. Bodies that are not JSON are kept verbatim as the message.
    pub fn from_response(status: u16, body: &str, name: Option<&str>) -> Self {
        let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = match (parsed.message, parsed.error_code) {
            (Some(message), Some(code)) => format!("{message} (errorCode {code})"),
            (Some(message), None) => message,
            (None, Some(code)) => format!("errorCode {code}"),
            (None, None) => body.trim().to_string(),
        };

        if status == 400 {
            let lowered = message.to_lowercase();
            if lowered.contains("already exists")
                || lowered.contains("must be unique")
                || lowered.contains("duplicate")
            {
                return RemoteError::DuplicateName {
                    name: name.unwrap_or_default().to_string(),
                    message,
                };
            }
            if lowered.contains("invalid") || lowered.contains("required") {
                return RemoteError::Validation { message };
            }
        }

        RemoteError::Status { status, message }
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, RemoteError::DuplicateName { .. })
    }
}

/// A remote error together with its classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} [{category}]")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    #[source]
    pub error: RemoteError,
}

impl ClassifiedError {
    pub fn new(category: ErrorCategory, error: RemoteError) -> Self {
        Self { category, error }
    }
}

/// Outcome of a failed [`RetryExecutor`](crate::resilience::RetryExecutor) run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Non-retryable failure, surfaced on the attempt it occurred
    #[error("{operation} failed: {error}")]
    Fatal {
        operation: String,
        attempts: u32,
        error: ClassifiedError,
    },

    /// Retryable failures persisted through every allowed attempt
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: ClassifiedError,
    },

    /// The run was cancelled externally
    #[error("{operation} cancelled after {attempts} attempts")]
    Cancelled { operation: String, attempts: u32 },

    /// The next attempt or sleep would cross the configured deadline
    #[error("{operation} exceeded its deadline after {attempts} attempts")]
    DeadlineExceeded { operation: String, attempts: u32 },
}

impl RetryError {
    /// The underlying remote error, if the run ended on one
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            RetryError::Fatal { error, .. } => Some(&error.error),
            RetryError::Exhausted { last_error, .. } => Some(&last_error.error),
            RetryError::Cancelled { .. } | RetryError::DeadlineExceeded { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. }
            | RetryError::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    pub fn is_duplicate_name(&self) -> bool {
        self.remote_error().is_some_and(RemoteError::is_duplicate_name)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RetryError::Cancelled { .. } | RetryError::DeadlineExceeded { .. }
        )
    }
}

/// Crate-level error type
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Lookup or creation of a named resource failed
    #[error("Reconciliation of '{resource}' in {scope} failed: {source}")]
    Reconcile {
        resource: String,
        scope: String,
        #[source]
        source: RetryError,
    },

    /// Writing one hierarchy level failed
    #[error("Row loading for sheet '{sheet}' failed at level {level}: {source}")]
    RowLoad {
        sheet: String,
        level: usize,
        #[source]
        source: RetryError,
    },

    /// A row referenced a parent that has not been materialized
    #[error("Parent '{parent}' of row '{external_id}' has no remote row id")]
    UnresolvedParent { external_id: String, parent: String },

    /// The platform acknowledged a different number of rows than were sent
    #[error("Wrote {sent} rows to '{sheet}' at level {level} but received {returned} row ids")]
    RowCountMismatch {
        sheet: String,
        level: usize,
        sent: usize,
        returned: usize,
    },

    /// A required column was not resolved for the sheet
    #[error("Column '{column}' is not defined on sheet '{sheet}'")]
    UnknownColumn { sheet: String, column: String },

    /// A foundational resource failed, nothing downstream can proceed
    #[error("Migration unit '{unit}' aborted: {reason}")]
    UnitAborted { unit: String, reason: String },

    #[error("Migration cancelled: {0}")]
    Cancelled(String),
}

impl MigrationError {
    /// Whether this error came from an external cancellation or deadline
    pub fn is_cancelled(&self) -> bool {
        match self {
            MigrationError::Cancelled(_) => true,
            MigrationError::Reconcile { source, .. } | MigrationError::RowLoad { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_detects_duplicate_name() {
        let body = r#"{"errorCode": 1018, "message": "Column titles must be unique"}"#;
        let error = RemoteError::from_response(400, body, Some("Status"));

        match error {
            RemoteError::DuplicateName { name, message } => {
                assert_eq!(name, "Status");
                assert!(message.contains("errorCode 1018"));
            }
            other => panic!("Expected DuplicateName, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_keeps_plain_body() {
        let error = RemoteError::from_response(503, "Service Unavailable\n", None);
        assert_eq!(error, RemoteError::status(503, "Service Unavailable"));
        assert_eq!(error.status_code(), Some(503));
    }

    #[test]
    fn test_from_response_validation() {
        let body = r#"{"message": "Required object attribute(s) are missing: title"}"#;
        let error = RemoteError::from_response(400, body, None);
        assert!(matches!(error, RemoteError::Validation { .. }));
        assert_eq!(error.status_code(), Some(400));
    }

    #[test]
    fn test_exhausted_display_includes_attempts() {
        let error = RetryError::Exhausted {
            operation: "create sheet 'Proj-A - Tasks'".to_string(),
            attempts: 5,
            last_error: ClassifiedError::new(
                ErrorCategory::Unavailable,
                RemoteError::status(503, "maintenance"),
            ),
        };

        assert_eq!(
            error.to_string(),
            "create sheet 'Proj-A - Tasks' failed after 5 attempts: HTTP 503: maintenance [Unavailable]"
        );
        assert_eq!(error.attempts(), 5);
    }
}
