//! Pipeline entry point: validate, destroy orphans, apply.

use super::actions::{ApplyAction, DestroyAction};
use super::diff::{orphaned_tasks, recorded_tasks};
use super::graph::DependencyGraph;
use super::scheduler::{emit, RunOutcome, Scheduler};
use super::validation::validate_infra;
use crate::backend::BackendRegistry;
use crate::config::PipelineConfig;
use crate::core::{
    error_codes, ErrorDetail, ExecutionState, ExecutionStatus, Infra, TaskExecutionStatus,
};
use crate::errors::{InfraflowError, SchedulerError};
use crate::interpolation::{Interpolator, OriginRegistry};
use crate::observability::SpanTimer;
use crate::reporter::{RetryingReporter, StatusReporter, StatusSender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Instrument;

const INVALID_INFRA_TIP: &str = "Verify that the infra tasks and their dependencies are valid";
const TIMEOUT_TIP: &str = "Verify if your infrastructure is not stuck in some task.";

/// What a run does to an infra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionAction {
    /// Destroy orphaned tasks, then apply the desired tasks.
    Apply,
    /// Destroy every recorded task.
    Destroy,
}

impl ExecutionAction {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "APPLY",
            Self::Destroy => "DESTROY",
        }
    }
}

impl fmt::Display for ExecutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "APPLY" => Ok(Self::Apply),
            "DESTROY" => Ok(Self::Destroy),
            other => Err(format!("unknown execution action {other}")),
        }
    }
}

/// Round partition of the graphs a run would execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Destroy rounds, run first.
    pub destroy: Vec<Vec<String>>,
    /// Apply rounds; empty for [`ExecutionAction::Destroy`].
    pub apply: Vec<Vec<String>>,
}

/// Runs apply and destroy executions for infras.
pub struct Pipeline {
    backends: BackendRegistry,
    reporter: Arc<dyn StatusReporter>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline with default configuration.
    #[must_use]
    pub fn new(backends: BackendRegistry, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            backends,
            reporter,
            config: PipelineConfig::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn retrying_reporter(&self) -> Arc<dyn StatusReporter> {
        Arc::new(RetryingReporter::new(
            self.reporter.clone(),
            self.config.retry.clone(),
        ))
    }

    /// Computes the rounds a run would execute, without running anything.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid apply spec and a scheduler
    /// error if a graph cannot be partitioned.
    pub fn plan(&self, action: ExecutionAction, infra: &Infra) -> Result<ExecutionPlan, InfraflowError> {
        let destroy = DependencyGraph::destroy_graph(&destroy_records(action, infra)).levels()?;
        let apply = match action {
            ExecutionAction::Apply => {
                let origins = OriginRegistry::with_defaults(self.reporter.clone(), &infra.namespace);
                validate_infra(infra, &origins)?;
                DependencyGraph::apply_graph(infra).levels()?
            }
            ExecutionAction::Destroy => Vec::new(),
        };
        Ok(ExecutionPlan { destroy, apply })
    }

    /// Executes `action` on `infra`.
    ///
    /// Every completed task produces a cumulative snapshot on `sink`; the last
    /// snapshot sent is always the terminal one, which is also returned.
    /// Task failures are reported in the returned status, never as errors.
    pub async fn start(
        &self,
        action: ExecutionAction,
        infra: &Infra,
        sink: StatusSender,
    ) -> ExecutionStatus {
        let span = tracing::info_span!(
            "execution",
            infra = %infra.name,
            namespace = %infra.namespace,
            action = %action
        );
        self.start_inner(action, infra, &sink).instrument(span).await
    }

    async fn start_inner(
        &self,
        action: ExecutionAction,
        infra: &Infra,
        sink: &StatusSender,
    ) -> ExecutionStatus {
        let timer = SpanTimer::start(action.as_str());
        let reporter = self.retrying_reporter();
        let origins = OriginRegistry::with_defaults(reporter.clone(), &infra.namespace);
        let mut status = ExecutionStatus::running();

        tracing::info!(tasks = infra.spec.tasks.len(), "Starting execution");

        if action == ExecutionAction::Apply {
            if let Err(e) = validate_infra(infra, &origins) {
                tracing::warn!(error = %e, "Infra validation failed");
                status.finalize(
                    ExecutionState::Error,
                    Some(
                        ErrorDetail::new(e.to_string(), error_codes::INVALID_INFRA)
                            .with_tip(INVALID_INFRA_TIP),
                    ),
                );
                emit(sink, &status);
                return status;
            }
        }

        let run = self.execute(action, infra, origins, reporter, &mut status, sink);
        let result = match self.config.time_limit() {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        match result {
            Some(Ok(RunOutcome::Succeeded)) => {
                status.finalize(ExecutionState::Success, None);
            }
            Some(Ok(RunOutcome::Failed { task, error })) => {
                tracing::warn!(task = %task, code = %error.code, "Execution failed");
                status.finalize(ExecutionState::Error, Some(error));
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Scheduler error");
                status.finalize(
                    ExecutionState::Error,
                    Some(ErrorDetail::new(e.to_string(), error_codes::SCHEDULER_ERROR)),
                );
            }
            None => {
                tracing::warn!(limit_secs = ?self.config.time_limit_secs, "Execution timed out");
                status.finalize(
                    ExecutionState::Timeout,
                    Some(
                        ErrorDetail::new("time limit exceeded", error_codes::TIME_LIMIT_EXCEEDED)
                            .with_tip(TIMEOUT_TIP),
                    ),
                );
            }
        }

        emit(sink, &status);
        tracing::info!(
            status = %status.status,
            tasks = status.tasks.len(),
            duration_ms = timer.finish(),
            "Execution finished"
        );
        status
    }

    async fn execute(
        &self,
        action: ExecutionAction,
        infra: &Infra,
        origins: OriginRegistry,
        reporter: Arc<dyn StatusReporter>,
        status: &mut ExecutionStatus,
        sink: &StatusSender,
    ) -> Result<RunOutcome, SchedulerError> {
        let records = destroy_records(action, infra);
        if !records.is_empty() {
            let graph = DependencyGraph::destroy_graph(&records);
            let destroy = DestroyAction::new(
                infra.namespace.clone(),
                records,
                self.backends.clone(),
                reporter.clone(),
            )
            .with_workdir_root(self.config.workdir_root.clone());

            let outcome = Scheduler::new(&graph)
                .with_label("destroy")
                .run(Arc::new(destroy), status, sink)
                .await?;
            if outcome != RunOutcome::Succeeded {
                return Ok(outcome);
            }
        }

        if action == ExecutionAction::Destroy {
            return Ok(RunOutcome::Succeeded);
        }

        let graph = DependencyGraph::apply_graph(infra);
        let apply = ApplyAction::new(infra, Interpolator::new(origins), self.backends.clone(), reporter)
            .with_workdir_root(self.config.workdir_root.clone());

        Scheduler::new(&graph)
            .with_label("apply")
            .run(Arc::new(apply), status, sink)
            .await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("backends", &self.backends)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn destroy_records(action: ExecutionAction, infra: &Infra) -> Vec<TaskExecutionStatus> {
    match action {
        ExecutionAction::Apply => orphaned_tasks(infra),
        ExecutionAction::Destroy => recorded_tasks(infra),
    }
}
