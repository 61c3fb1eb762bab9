//! # Resilience Module
//!
//! Retry handling for calls against the destination platform.
//!
//! ## Architecture
//!
//! - **Error classification**: maps each remote failure to an [`ErrorCategory`]; only
//!   eventual-consistency, rate-limit, availability and network failures are retried
//! - **Backoff**: jitter-free exponential [`RetryPolicy`] capped at a configurable ceiling
//! - **Execution**: [`RetryExecutor`] drives one [`RemoteOperation`] to success or to a
//!   [`RetryError`](crate::error::RetryError), honouring cancellation and deadlines
//!
//! ## Usage
//!
//! ```rust,no_run
//! use project_migrator::resilience::{OperationKind, RemoteOperation, RetryExecutor, RetryPolicy};
//! use project_migrator::error::RemoteError;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = RetryExecutor::new(RetryPolicy::default());
//! let sheet_id = executor
//!     .execute(RemoteOperation::new("find sheet 'Proj-A'", OperationKind::Lookup, || async {
//!         Ok::<_, RemoteError>(42_u64)
//!     }))
//!     .await?;
//! # let _ = sheet_id;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod error_classifier;
pub mod retry_executor;

pub use backoff::RetryPolicy;
pub use error_classifier::{
    ErrorCategory, ErrorClassifier, ErrorContext, OperationKind, StandardErrorClassifier,
};
pub use retry_executor::{RemoteOperation, RetryExecutor, RetryState};
