//! # Remote Error Classification
//!
//! Decides, for a single failed remote call, whether the failure is transient and worth
//! retrying or fatal and to be surfaced immediately.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ RemoteError     │────▶│ ErrorClassifier │────▶│ ErrorCategory   │
//! │ + ErrorContext  │     │                 │     │ (retryable?)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! | Failure | Category | Retried |
//! |---|---|---|
//! | 404 shortly after a create in the same container | `EventualConsistency` | yes |
//! | 429 | `RateLimited` | yes |
//! | 5xx | `Unavailable` | yes |
//! | timeout, connection reset, 408 | `Network` | yes |
//! | 400 and other 4xx | `BadRequest` | no |
//! | 401 / 403 | `Unauthorized` | no |
//! | 404 with no recent create | `NotFound` | no |
//! | remote schema/validation failure | `Validation` | no |
//! | duplicate name | `DuplicateName` | no (the reconciler resolves it) |

use serde::{Deserialize, Serialize};

use crate::constants::status;
use crate::error::RemoteError;

/// Classification of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The remote system has not yet made a fresh write visible to reads
    EventualConsistency,
    /// Request throttled
    RateLimited,
    /// Server-side failure or maintenance
    Unavailable,
    /// Transport-level transient failure
    Network,
    /// Malformed request
    BadRequest,
    /// Authentication or authorization failure
    Unauthorized,
    /// Resource that was never expected to exist
    NotFound,
    /// Schema or validation failure reported by the remote
    Validation,
    /// Name already taken in the target scope
    DuplicateName,
}

impl ErrorCategory {
    /// Whether the retry executor may attempt the call again
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::EventualConsistency
                | ErrorCategory::RateLimited
                | ErrorCategory::Unavailable
                | ErrorCategory::Network
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::EventualConsistency => write!(f, "Eventual Consistency"),
            ErrorCategory::RateLimited => write!(f, "Rate Limited"),
            ErrorCategory::Unavailable => write!(f, "Unavailable"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::BadRequest => write!(f, "Bad Request"),
            ErrorCategory::Unauthorized => write!(f, "Unauthorized"),
            ErrorCategory::NotFound => write!(f, "Not Found"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::DuplicateName => write!(f, "Duplicate Name"),
        }
    }
}

/// What kind of remote call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Lookup,
    Create,
    Write,
}

/// Context information for error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub kind: OperationKind,
    /// A create of the same or a parent resource succeeded within the consistency window
    pub follows_create: bool,
}

impl ErrorContext {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            follows_create: false,
        }
    }
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    /// Classify a remote failure
    fn classify(&self, error: &RemoteError, context: &ErrorContext) -> ErrorCategory;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Status-code based classifier for the destination platform
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_status(status: u16, context: &ErrorContext) -> ErrorCategory {
        match status {
            status::NOT_FOUND if context.follows_create => ErrorCategory::EventualConsistency,
            status::NOT_FOUND => ErrorCategory::NotFound,
            status::TOO_MANY_REQUESTS => ErrorCategory::RateLimited,
            status::UNAUTHORIZED | status::FORBIDDEN => ErrorCategory::Unauthorized,
            status::REQUEST_TIMEOUT => ErrorCategory::Network,
            s if status::is_server_error(s) => ErrorCategory::Unavailable,
            _ => ErrorCategory::BadRequest,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, error: &RemoteError, context: &ErrorContext) -> ErrorCategory {
        match error {
            RemoteError::Status { status, .. } => Self::classify_status(*status, context),
            RemoteError::Network { .. } => ErrorCategory::Network,
            RemoteError::DuplicateName { .. } => ErrorCategory::DuplicateName,
            RemoteError::Validation { .. } => ErrorCategory::Validation,
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkErrorKind;

    fn lookup() -> ErrorContext {
        ErrorContext::new(OperationKind::Lookup)
    }

    fn after_create() -> ErrorContext {
        ErrorContext {
            kind: OperationKind::Lookup,
            follows_create: true,
        }
    }

    #[test]
    fn test_not_found_depends_on_recent_create() {
        let classifier = StandardErrorClassifier::new();
        let error = RemoteError::status(404, "Not Found");

        assert_eq!(
            classifier.classify(&error, &after_create()),
            ErrorCategory::EventualConsistency
        );
        assert_eq!(
            classifier.classify(&error, &lookup()),
            ErrorCategory::NotFound
        );
        assert!(!ErrorCategory::NotFound.is_retryable());
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        let classifier = StandardErrorClassifier::new();
        for status in [429, 500, 502, 503, 504, 408] {
            let category = classifier.classify(&RemoteError::status(status, "x"), &lookup());
            assert!(category.is_retryable(), "status {status} should be retryable");
        }

        let network = RemoteError::network(NetworkErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(
            classifier.classify(&network, &lookup()),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_caller_errors_are_fatal() {
        let classifier = StandardErrorClassifier::new();
        let cases = [
            (RemoteError::status(400, "bad"), ErrorCategory::BadRequest),
            (RemoteError::status(401, "auth"), ErrorCategory::Unauthorized),
            (RemoteError::status(403, "forbidden"), ErrorCategory::Unauthorized),
            (RemoteError::status(409, "conflict"), ErrorCategory::BadRequest),
            (
                RemoteError::Validation {
                    message: "bad column type".to_string(),
                },
                ErrorCategory::Validation,
            ),
            (RemoteError::duplicate("Status"), ErrorCategory::DuplicateName),
        ];

        for (error, expected) in cases {
            let category = classifier.classify(&error, &after_create());
            assert_eq!(category, expected, "{error}");
            assert!(!category.is_retryable());
        }
    }
}
