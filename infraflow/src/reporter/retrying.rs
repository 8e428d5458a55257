//! Reporter decorator that retries transient failures.

use super::{StatusReporter, TaskOutputRecord};
use crate::core::ExecutionStatus;
use crate::errors::ReporterError;
use crate::pipeline::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;

/// Wraps a reporter and retries failed calls with backoff.
///
/// Only [`ReporterError::Call`] failures are retried. Not-found and closed
/// errors are returned immediately.
#[derive(Debug)]
pub struct RetryingReporter<R> {
    inner: R,
    config: RetryConfig,
}

impl<R: StatusReporter> RetryingReporter<R> {
    /// Wraps a reporter.
    #[must_use]
    pub fn new(inner: R, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped reporter.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

fn is_transient(err: &ReporterError) -> bool {
    matches!(err, ReporterError::Call { .. })
}

#[async_trait]
impl<R: StatusReporter> StatusReporter for RetryingReporter<R> {
    async fn get_task_output(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<TaskOutputRecord, ReporterError> {
        with_retry_if(
            &self.config,
            "get_task_output",
            || self.inner.get_task_output(name, namespace),
            is_transient,
        )
        .await
    }

    async fn apply_task_output(&self, output: TaskOutputRecord) -> Result<(), ReporterError> {
        with_retry_if(
            &self.config,
            "apply_task_output",
            || self.inner.apply_task_output(output.clone()),
            is_transient,
        )
        .await
    }

    async fn delete_task_output(&self, name: &str, namespace: &str) -> Result<(), ReporterError> {
        with_retry_if(
            &self.config,
            "delete_task_output",
            || self.inner.delete_task_output(name, namespace),
            is_transient,
        )
        .await
    }

    async fn report_execution(&self, status: ExecutionStatus) -> Result<(), ReporterError> {
        with_retry_if(
            &self.config,
            "report_execution",
            || self.inner.report_execution(status.clone()),
            is_transient,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retry::JitterStrategy;
    use crate::reporter::MockStatusReporter;
    use mockall::Sequence;

    fn fast(attempts: usize) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(attempts)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None)
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let mut inner = MockStatusReporter::new();
        let mut seq = Sequence::new();
        inner
            .expect_apply_task_output()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ReporterError::call("apply_task_output", "connection reset")));
        inner
            .expect_apply_task_output()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let reporter = RetryingReporter::new(inner, fast(5));
        reporter
            .apply_task_output(TaskOutputRecord::new("db", "default"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let mut inner = MockStatusReporter::new();
        inner
            .expect_report_execution()
            .times(3)
            .returning(|_| Err(ReporterError::call("report_execution", "unavailable")));

        let reporter = RetryingReporter::new(inner, fast(3));
        let err = reporter
            .report_execution(ExecutionStatus::running())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "call report_execution failed: unavailable");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut inner = MockStatusReporter::new();
        inner.expect_get_task_output().times(1).returning(|name, _| {
            Err(ReporterError::NotFound {
                kind: "task output".into(),
                name: name.to_string(),
            })
        });

        let reporter = RetryingReporter::new(inner, fast(5));
        let err = reporter.get_task_output("db", "default").await.unwrap_err();
        assert!(matches!(err, ReporterError::NotFound { .. }));
    }
}
