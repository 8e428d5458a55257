//! Apply and destroy units of work.

use super::scheduler::{TaskAction, TaskOutcome};
use crate::backend::{ApplyRequest, BackendRegistry, DestroyRequest};
use crate::context::{ContextHandle, TaskOutputs};
use crate::core::{
    error_codes, BackendState, ErrorDetail, Infra, TaskExecutionStatus, TaskSpec, TaskStatus,
};
use crate::interpolation::Interpolator;
use crate::reporter::{StatusReporter, TaskOutputItem, TaskOutputRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

const INVALID_BACKEND_TIP: &str = "Verify that the task backend is valid";

/// Applies spec tasks: interpolate, apply, publish outputs.
pub struct ApplyAction {
    infra_name: String,
    namespace: String,
    tasks: HashMap<String, TaskSpec>,
    previous: HashMap<String, BackendState>,
    interpolator: Interpolator,
    backends: BackendRegistry,
    reporter: Arc<dyn StatusReporter>,
    workdir_root: PathBuf,
}

impl ApplyAction {
    /// Creates the apply action for an infra.
    #[must_use]
    pub fn new(
        infra: &Infra,
        interpolator: Interpolator,
        backends: BackendRegistry,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let previous = infra
            .spec
            .tasks
            .iter()
            .filter_map(|t| {
                infra
                    .last_task_execution(&t.name)
                    .map(|record| (t.name.clone(), record.backend_state.clone()))
            })
            .collect();

        Self {
            infra_name: infra.name.clone(),
            namespace: infra.namespace.clone(),
            tasks: infra
                .spec
                .tasks
                .iter()
                .map(|t| (t.name.clone(), t.clone()))
                .collect(),
            previous,
            interpolator,
            backends,
            reporter,
            workdir_root: std::env::temp_dir(),
        }
    }

    /// Sets the root for backend working directories.
    #[must_use]
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = root.into();
        self
    }

    async fn publish_outputs(&self, spec: &TaskSpec, outputs: &TaskOutputs) -> Result<(), String> {
        let mut keys: Vec<&String> = outputs.keys().collect();
        keys.sort();

        for output_ref in &spec.task_outputs {
            tracing::info!(task = %spec.name, output = %output_ref.name, "Publishing task output");
            let record = keys.iter().fold(
                TaskOutputRecord::new(output_ref.name.clone(), self.namespace.clone())
                    .with_owner(self.infra_name.clone(), spec.name.clone()),
                |record, key| {
                    let item = &outputs[*key];
                    let mut entry = TaskOutputItem::new((*key).clone(), item.value.clone());
                    entry.sensitive = item.sensitive;
                    record.with_item(entry)
                },
            );
            self.reporter
                .apply_task_output(record)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[async_trait]
impl TaskAction for ApplyAction {
    async fn execute(&self, task: &str, ctx: &ContextHandle) -> TaskOutcome {
        tracing::info!(task, action = "apply", "Applying task");

        let Some(spec) = self.tasks.get(task) else {
            let mut record = TaskExecutionStatus::started_unknown(task, TaskStatus::Applied);
            record.fail(ErrorDetail::new(
                format!("not found task {task} in infra spec"),
                error_codes::INVALID_INFRA,
            ));
            return TaskOutcome::failure(record);
        };
        let mut record = TaskExecutionStatus::started_from_spec(spec, TaskStatus::Applied);
        // Only a successful backend apply replaces the recorded state.
        let previous = self.previous.get(task).cloned().unwrap_or_default();
        record.backend_state.clone_from(&previous);

        let inputs = match self.interpolator.resolve_inputs(&spec.inputs, ctx).await {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::warn!(task, error = %e, "Input interpolation failed");
                record.fail(
                    ErrorDetail::new(e.to_string(), error_codes::TASK_INPUT_INTERPOLATION_ERROR)
                        .with_tip("Verify that the task inputs are valid"),
                );
                return TaskOutcome::failure(record);
            }
        };
        record.inputs.clone_from(&inputs);

        let backend = match self.backends.resolve(&spec.backend) {
            Ok(backend) => backend,
            Err(e) => {
                record.fail(
                    ErrorDetail::new(e.to_string(), error_codes::INVALID_TASK_BACKEND)
                        .with_tip(INVALID_BACKEND_TIP),
                );
                return TaskOutcome::failure(record);
            }
        };

        let request = ApplyRequest {
            task: task.to_string(),
            source: spec.source.clone(),
            inputs,
            previous,
            workdir_root: self.workdir_root.clone(),
        };
        let result = match backend.apply(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(task, error = %e, "Backend apply failed");
                record.fail(
                    ErrorDetail::new(e.to_string(), error_codes::TASK_APPLY_BACKEND_ERROR).with_tip(
                        format!("Verify that the {} code of task {task} is valid", spec.backend),
                    ),
                );
                return TaskOutcome::failure(record);
            }
        };
        record.backend_state = result.state;

        if let Err(message) = self.publish_outputs(spec, &result.outputs).await {
            record.fail(
                ErrorDetail::new(message, error_codes::TASK_OUTPUT_CREATION_ERROR).with_tip(format!(
                    "An error occurred while creating task outputs for task {task}, please retry the execution"
                )),
            );
            return TaskOutcome::failure(record);
        }

        record.finish();
        TaskOutcome::success(record, result.outputs)
    }
}

/// Destroys tasks from their last execution records.
pub struct DestroyAction {
    namespace: String,
    records: HashMap<String, TaskExecutionStatus>,
    backends: BackendRegistry,
    reporter: Arc<dyn StatusReporter>,
    workdir_root: PathBuf,
}

impl DestroyAction {
    /// Creates the destroy action over the given records.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        records: Vec<TaskExecutionStatus>,
        backends: BackendRegistry,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            records: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
            backends,
            reporter,
            workdir_root: std::env::temp_dir(),
        }
    }

    /// Sets the root for backend working directories.
    #[must_use]
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = root.into();
        self
    }
}

#[async_trait]
impl TaskAction for DestroyAction {
    async fn execute(&self, task: &str, _ctx: &ContextHandle) -> TaskOutcome {
        tracing::info!(task, action = "destroy", "Destroying task");

        let Some(previous) = self.records.get(task) else {
            let mut record = TaskExecutionStatus::started_unknown(task, TaskStatus::Destroyed);
            record.fail(
                ErrorDetail::new("invalid task backend", error_codes::INVALID_TASK_BACKEND)
                    .with_tip(INVALID_BACKEND_TIP),
            );
            return TaskOutcome::failure(record);
        };
        let mut record = TaskExecutionStatus::started_from_record(previous, TaskStatus::Destroyed);

        let backend = match self.backends.resolve(&previous.backend) {
            Ok(backend) => backend,
            Err(e) => {
                record.fail(
                    ErrorDetail::new(e.to_string(), error_codes::INVALID_TASK_BACKEND)
                        .with_tip(INVALID_BACKEND_TIP),
                );
                return TaskOutcome::failure(record);
            }
        };

        let request = DestroyRequest {
            task: task.to_string(),
            source: previous.source.clone(),
            inputs: previous.inputs.clone(),
            previous: previous.backend_state.clone(),
            workdir_root: self.workdir_root.clone(),
        };
        if let Err(e) = backend.destroy(request).await {
            tracing::warn!(task, error = %e, "Backend destroy failed");
            record.fail(ErrorDetail::new(
                e.to_string(),
                error_codes::TASK_DESTROY_BACKEND_ERROR,
            ));
            return TaskOutcome::failure(record);
        }
        record.backend_state = BackendState::default();

        for output_ref in &previous.task_outputs {
            if let Err(e) = self
                .reporter
                .delete_task_output(&output_ref.name, &self.namespace)
                .await
            {
                record.fail(ErrorDetail::new(
                    e.to_string(),
                    error_codes::DESTROY_TASK_OUTPUTS_ERROR,
                ));
                return TaskOutcome::failure(record);
            }
        }

        record.finish();
        TaskOutcome::success(record, TaskOutputs::new())
    }
}
