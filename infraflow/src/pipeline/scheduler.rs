//! Level-synchronized dependency scheduler.
//!
//! Every node whose dependencies have all completed is started in the same
//! round, each on its own tokio task. A round always runs to completion, and
//! the next round starts only afterwards. If any unit in a round failed, the
//! run stops once the round has drained.

use super::DependencyGraph;
use crate::context::{ContextHandle, TaskOutputs};
use crate::core::{ErrorDetail, ExecutionStatus, TaskExecutionStatus};
use crate::errors::SchedulerError;
use crate::reporter::StatusSender;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

/// What one unit of work produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// The task's execution record.
    pub status: TaskExecutionStatus,
    /// Outputs to record; ignored for failed tasks.
    pub outputs: TaskOutputs,
}

impl TaskOutcome {
    /// A successful outcome with outputs.
    #[must_use]
    pub fn success(status: TaskExecutionStatus, outputs: TaskOutputs) -> Self {
        Self { status, outputs }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(status: TaskExecutionStatus) -> Self {
        Self {
            status,
            outputs: TaskOutputs::new(),
        }
    }

    /// Returns true if the task failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// The work the scheduler runs for each node.
///
/// Failures are reported through the returned status, never by panicking.
#[async_trait]
pub trait TaskAction: Send + Sync {
    /// Executes one task. `ctx` holds outputs of tasks from earlier rounds.
    async fn execute(&self, task: &str, ctx: &ContextHandle) -> TaskOutcome;
}

/// How a scheduler run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every node completed successfully.
    Succeeded,
    /// A task failed; later rounds were not started.
    Failed {
        /// The first task observed failing.
        task: String,
        /// Its error.
        error: ErrorDetail,
    },
}

/// Runs a dependency graph in rounds.
#[derive(Debug)]
pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
    label: &'static str,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler over a graph.
    #[must_use]
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            label: "run",
        }
    }

    /// Sets the label used in logs.
    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Runs every node with `action`.
    ///
    /// Each completed unit's record is appended to `status` and a snapshot is
    /// sent on `sink`. Outputs of successful units are recorded in a context
    /// fresh to this run.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stalled`] if no node is ready while some
    /// remain, and [`SchedulerError::Join`] if a unit panicked.
    pub async fn run(
        &self,
        action: Arc<dyn TaskAction>,
        status: &mut ExecutionStatus,
        sink: &StatusSender,
    ) -> Result<RunOutcome, SchedulerError> {
        let order = self.graph.nodes();
        let handle = ContextHandle::with_pending(self.graph.in_degrees());
        let mut round = 0usize;

        if order.is_empty() {
            tracing::info!(run = self.label, "Nothing to execute");
            return Ok(RunOutcome::Succeeded);
        }

        loop {
            let unfinished = handle.unfinished(order);
            if unfinished.is_empty() {
                tracing::info!(run = self.label, rounds = round, "Executed all tasks successfully");
                return Ok(RunOutcome::Succeeded);
            }

            let ready = handle.ready(order);
            if ready.is_empty() {
                tracing::error!(run = self.label, pending = ?unfinished, "Scheduler stalled");
                return Err(SchedulerError::Stalled {
                    pending: unfinished,
                });
            }

            round += 1;
            tracing::info!(run = self.label, round, tasks = ?ready, "Starting round");

            let mut units = FuturesUnordered::new();
            for task in ready {
                let action = action.clone();
                let ctx = handle.clone();
                let name = task.clone();
                let join = tokio::spawn(async move { action.execute(&name, &ctx).await });
                units.push(async move { (task, join.await) });
            }

            let mut failure: Option<RunOutcome> = None;
            let mut round_error: Option<SchedulerError> = None;

            while let Some((task, joined)) = units.next().await {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(run = self.label, task = %task, error = %e, "Task unit did not complete");
                        round_error.get_or_insert(SchedulerError::Join {
                            task,
                            message: e.to_string(),
                        });
                        continue;
                    }
                };

                tracing::info!(
                    run = self.label,
                    task = %task,
                    status = %outcome.status.status,
                    "Task finished"
                );

                if outcome.is_failure() {
                    failure.get_or_insert_with(|| RunOutcome::Failed {
                        task: task.clone(),
                        error: outcome.status.error.clone().unwrap_or_default(),
                    });
                } else if let Err(e) =
                    handle.complete(&task, outcome.outputs, &self.graph.dependents(&task))
                {
                    round_error.get_or_insert(e.into());
                }

                status.tasks.push(outcome.status);
                emit(sink, status);
            }

            if let Some(err) = round_error {
                return Err(err);
            }
            if let Some(failed) = failure {
                tracing::warn!(run = self.label, round, "Round finished with a failed task");
                return Ok(failed);
            }
        }
    }
}

/// Sends a snapshot; a closed stream is not an error for the run.
pub(crate) fn emit(sink: &StatusSender, status: &ExecutionStatus) {
    if sink.send(status.clone()).is_err() {
        tracing::debug!(status = %status.status, "Status stream closed; snapshot dropped");
    }
}
