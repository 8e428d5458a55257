//! Drains the status stream into a reporter.

use super::{StatusReceiver, StatusReporter};
use crate::core::ExecutionStatus;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Forwards every snapshot from the status stream to a reporter.
///
/// Reporter failures are logged and do not stop forwarding; the stream ends
/// when the pipeline drops its sender.
pub struct StatusForwarder {
    reporter: Arc<dyn StatusReporter>,
}

impl StatusForwarder {
    /// Creates a forwarder.
    #[must_use]
    pub fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self { reporter }
    }

    /// Forwards until the stream closes and returns the last snapshot seen.
    pub async fn run(self, mut receiver: StatusReceiver) -> Option<ExecutionStatus> {
        let mut last = None;
        let mut forwarded = 0usize;

        while let Some(status) = receiver.recv().await {
            if let Err(e) = self.reporter.report_execution(status.clone()).await {
                tracing::warn!(
                    status = %status.status,
                    tasks = status.tasks.len(),
                    error = %e,
                    "Failed to report execution status"
                );
            } else {
                forwarded += 1;
            }
            last = Some(status);
        }

        tracing::debug!(forwarded, "Status stream closed");
        last
    }

    /// Runs the forwarder on a background task.
    pub fn spawn(self, receiver: StatusReceiver) -> JoinHandle<Option<ExecutionStatus>> {
        tokio::spawn(self.run(receiver))
    }
}

impl std::fmt::Debug for StatusForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusForwarder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionState;
    use crate::errors::ReporterError;
    use crate::reporter::{status_channel, MockStatusReporter};
    use crate::testing::InMemoryReporter;

    #[tokio::test]
    async fn test_forwards_all_snapshots_in_order() {
        let reporter = Arc::new(InMemoryReporter::new());
        let (tx, rx) = status_channel();
        let handle = StatusForwarder::new(reporter.clone()).spawn(rx);

        tx.send(ExecutionStatus::running()).unwrap();
        let mut done = ExecutionStatus::running();
        done.finalize(ExecutionState::Success, None);
        tx.send(done).unwrap();
        drop(tx);

        let last = handle.await.unwrap().unwrap();
        assert_eq!(last.status, ExecutionState::Success);

        let states: Vec<ExecutionState> =
            reporter.executions().iter().map(|s| s.status).collect();
        assert_eq!(states, vec![ExecutionState::Running, ExecutionState::Success]);
    }

    #[tokio::test]
    async fn test_keeps_forwarding_after_failure() {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_report_execution()
            .times(2)
            .returning(|_| Err(ReporterError::Closed));

        let (tx, rx) = status_channel();
        tx.send(ExecutionStatus::running()).unwrap();
        tx.send(ExecutionStatus::running()).unwrap();
        drop(tx);

        let last = StatusForwarder::new(Arc::new(reporter)).run(rx).await;
        assert!(last.is_some());
    }
}
