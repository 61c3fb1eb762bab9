//! # Retry Executor
//!
//! Wraps a single remote call, classifies each failure and decides whether and when to try
//! again. Fatal failures surface on the attempt they occur. Transient failures are retried
//! on the [`RetryPolicy`] schedule until attempts run out, at which point the last error is
//! returned as [`RetryError::Exhausted`].
//!
//! Cancellation and the optional deadline are checked before every attempt and before every
//! sleep, and the sleep itself wakes early on cancellation. An interrupted run leaves no state
//! behind; the lookup-before-create in the reconciler is what recovers on the next run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backoff::RetryPolicy;
use super::error_classifier::{ErrorClassifier, ErrorContext, OperationKind, StandardErrorClassifier};
use crate::error::{ClassifiedError, RemoteError, RetryError};
use crate::logging;
use crate::metrics::MigrationMetrics;

/// One unit of remote work, consumed by a single [`RetryExecutor::execute`] call
pub struct RemoteOperation<F> {
    name: String,
    context: ErrorContext,
    call: F,
}

impl<F> RemoteOperation<F> {
    /// `call` is invoked once per attempt
    pub fn new(name: impl Into<String>, kind: OperationKind, call: F) -> Self {
        Self {
            name: name.into(),
            context: ErrorContext::new(kind),
            call,
        }
    }

    /// Mark the call as following a create whose result may not be visible yet
    pub fn following_create(mut self, follows_create: bool) -> Self {
        self.context.follows_create = follows_create;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

/// Progress of one execute call
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempts: u32,
    pub total_delay: Duration,
    pub last_error: Option<ClassifiedError>,
}

impl RetryState {
    fn record_retry(&mut self, delay: Duration, error: ClassifiedError) {
        self.total_delay += delay;
        self.last_error = Some(error);
    }
}

/// Executes remote operations under a retry policy
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    metrics: Option<Arc<MigrationMetrics>>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("classifier", &self.classifier.classifier_name())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            classifier: Arc::new(StandardErrorClassifier::new()),
            cancellation: CancellationToken::new(),
            deadline: None,
            metrics: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Abort instead of starting an attempt or a sleep that would end past `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MigrationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Run `operation` under this executor's policy
    pub async fn execute<T, F, Fut>(&self, operation: RemoteOperation<F>) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let policy = self.policy.clone();
        self.execute_with_policy(operation, &policy).await
    }

    /// Run `operation` under an explicit policy
    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        operation: RemoteOperation<F>,
        policy: &RetryPolicy,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let RemoteOperation {
            name,
            context,
            mut call,
        } = operation;
        let max_attempts = policy.max_attempts.max(1);
        let mut state = RetryState::default();

        loop {
            self.check_interrupted(&name, state.attempts, Duration::ZERO)?;

            state.attempts += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_remote_call();
            }

            let error = match call().await {
                Ok(value) => {
                    if state.attempts > 1 {
                        debug!(
                            operation = %name,
                            attempts = state.attempts,
                            total_delay_ms = state.total_delay.as_millis() as u64,
                            "Remote operation recovered after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let category = self.classifier.classify(&error, &context);
            let classified = ClassifiedError::new(category, error);

            if !category.is_retryable() {
                logging::log_remote_operation(
                    &name,
                    state.attempts,
                    "fatal",
                    Some(&category.to_string()),
                    None,
                );
                return Err(RetryError::Fatal {
                    operation: name,
                    attempts: state.attempts,
                    error: classified,
                });
            }

            if state.attempts >= max_attempts {
                warn!(
                    operation = %name,
                    attempts = state.attempts,
                    category = %category,
                    error = %classified.error,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    operation: name,
                    attempts: state.attempts,
                    last_error: classified,
                });
            }

            let delay = policy.delay_for_retry(state.attempts);
            logging::log_remote_operation(
                &name,
                state.attempts,
                "retrying",
                Some(&category.to_string()),
                Some(delay.as_millis() as u64),
            );
            state.record_retry(delay, classified);
            if let Some(metrics) = &self.metrics {
                metrics.record_retry();
            }

            self.check_interrupted(&name, state.attempts, delay)?;
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    return Err(RetryError::Cancelled {
                        operation: name,
                        attempts: state.attempts,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn check_interrupted(
        &self,
        operation: &str,
        attempts: u32,
        upcoming_delay: Duration,
    ) -> Result<(), RetryError> {
        if self.cancellation.is_cancelled() {
            debug!(operation = %operation, attempts = attempts, "Remote operation cancelled");
            return Err(RetryError::Cancelled {
                operation: operation.to_string(),
                attempts,
            });
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() + upcoming_delay > deadline {
                debug!(operation = %operation, attempts = attempts, "Remote operation deadline reached");
                return Err(RetryError::DeadlineExceeded {
                    operation: operation.to_string(),
                    attempts,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_policy(3));
        let calls = AtomicU32::new(0);

        let result: Result<u32, RetryError> = executor
            .execute(RemoteOperation::new("noop", OperationKind::Lookup, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }))
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let metrics = Arc::new(MigrationMetrics::new());
        let executor = RetryExecutor::new(fast_policy(5)).with_metrics(metrics.clone());
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(RemoteOperation::new("flaky", OperationKind::Create, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::status(503, "unavailable"))
                } else {
                    Ok("done")
                }
            }))
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.remote_calls, 3);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_the_call() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = RetryExecutor::new(fast_policy(5)).with_cancellation(token);
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError> = executor
            .execute(RemoteOperation::new("never", OperationKind::Lookup, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
