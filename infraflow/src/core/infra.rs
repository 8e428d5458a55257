//! Declarative infra definitions and execution records.

use super::{ErrorDetail, ExecutionState, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key/value input handed to a task's backend.
///
/// In a spec the value is a template string; in an execution record it is the
/// resolved value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    /// Input key.
    pub key: String,
    /// Template or resolved value.
    pub value: String,
    /// Whether the value must be treated as a secret.
    #[serde(default)]
    pub sensitive: bool,
}

impl TaskInput {
    /// Creates a non-sensitive input.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    /// Marks the input as sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A named output group a task publishes for other infras to consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutputRef {
    /// Name of the published output group.
    pub name: String,
}

impl TaskOutputRef {
    /// Creates a new output group reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Where a backend fetches a task's source from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSource {
    /// Source location (registry, repository or image reference).
    pub source: String,
    /// Tool version the backend should use.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Reference to the credentials needed to fetch the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_ref: Option<String>,
}

impl TaskSource {
    /// Creates a new source reference.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Sets the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// A single provisioning task as declared in an infra spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Unique name within the infra.
    pub name: String,
    /// Names of tasks that must complete before this one.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Backend discriminator, e.g. `terraform`.
    pub backend: String,
    /// Backend-specific source reference.
    #[serde(default)]
    pub source: TaskSource,
    /// Inputs with template values.
    #[serde(default)]
    pub inputs: Vec<TaskInput>,
    /// Output groups published after a successful apply.
    #[serde(default)]
    pub task_outputs: Vec<TaskOutputRef>,
}

impl TaskSpec {
    /// Creates a task with the given name and backend.
    #[must_use]
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            ..Self::default()
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.depends.push(dep.into());
        self
    }

    /// Sets the source reference.
    #[must_use]
    pub fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, input: TaskInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Adds a published output group.
    #[must_use]
    pub fn with_task_output(mut self, name: impl Into<String>) -> Self {
        self.task_outputs.push(TaskOutputRef::new(name));
        self
    }
}

/// Opaque backend state persisted between executions.
///
/// Both blobs are backend-defined; the pipeline only carries them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
    /// Persisted resource state.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<u8>,
    /// Lock / dependency metadata.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub lock: Vec<u8>,
}

impl BackendState {
    /// Creates a backend state from raw blobs.
    #[must_use]
    pub fn new(state: impl Into<Vec<u8>>, lock: impl Into<Vec<u8>>) -> Self {
        Self {
            state: state.into(),
            lock: lock.into(),
        }
    }

    /// Returns true if neither blob holds data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.lock.is_empty()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim_matches('"'))
            .map_err(serde::de::Error::custom)
    }
}

/// The record of one task within an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecutionStatus {
    /// Task name.
    pub name: String,
    /// Dependencies at execution time.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Backend discriminator.
    pub backend: String,
    /// Backend source reference.
    #[serde(default)]
    pub source: TaskSource,
    /// Resolved inputs; sensitive values are present but flagged.
    #[serde(default)]
    pub inputs: Vec<TaskInput>,
    /// Output groups the task published.
    #[serde(default)]
    pub task_outputs: Vec<TaskOutputRef>,
    /// Backend state produced by the execution.
    #[serde(default)]
    pub backend_state: BackendState,
    /// When the task started.
    pub started_at: DateTime<Utc>,
    /// When the task finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Task outcome.
    pub status: TaskStatus,
    /// Error details when the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl TaskExecutionStatus {
    /// Starts a record for a task from the current spec.
    #[must_use]
    pub fn started_from_spec(task: &TaskSpec, status: TaskStatus) -> Self {
        Self {
            name: task.name.clone(),
            depends: task.depends.clone(),
            backend: task.backend.clone(),
            source: task.source.clone(),
            inputs: task.inputs.clone(),
            task_outputs: task.task_outputs.clone(),
            backend_state: BackendState::default(),
            started_at: Utc::now(),
            finished_at: None,
            status,
            error: None,
        }
    }

    /// Starts a record for a task from its previous execution record.
    ///
    /// The previous backend state is carried over so a failed destroy keeps
    /// what is needed to retry it.
    #[must_use]
    pub fn started_from_record(previous: &Self, status: TaskStatus) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            status,
            error: None,
            ..previous.clone()
        }
    }

    /// Starts a record for a task that has neither spec nor record.
    #[must_use]
    pub fn started_unknown(name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            backend: String::new(),
            source: TaskSource::default(),
            inputs: Vec::new(),
            task_outputs: Vec::new(),
            backend_state: BackendState::default(),
            started_at: Utc::now(),
            finished_at: None,
            status,
            error: None,
        }
    }

    /// Marks the task as finished successfully.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Marks the task as failed, switching to the error variant of its path.
    pub fn fail(&mut self, error: ErrorDetail) {
        self.status = self.status.as_failure();
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if the task failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// Aggregate status of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    /// Task records in completion order.
    #[serde(default)]
    pub tasks: Vec<TaskExecutionStatus>,
    /// Overall state.
    #[serde(default)]
    pub status: ExecutionState,
    /// Error of the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            status: ExecutionState::Running,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

impl ExecutionStatus {
    /// Creates a running status stamped with the current time.
    #[must_use]
    pub fn running() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Finds the record of a task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskExecutionStatus> {
        self.tasks.iter().rev().find(|t| t.name == name)
    }

    /// Returns task names in recorded order.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Finalizes the run with a terminal state.
    pub fn finalize(&mut self, state: ExecutionState, error: Option<ErrorDetail>) {
        self.status = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }
}

/// The desired task list of an infra.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraSpec {
    /// Ordered task declarations.
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

/// Observed state of an infra.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraStatus {
    /// The most recent execution, used to resume backend state and diff.
    #[serde(default)]
    pub last_execution: ExecutionStatus,
}

/// A declarative set of tasks plus the status of its last execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infra {
    /// Infra name.
    pub name: String,
    /// Namespace the infra and its published outputs live in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Desired state.
    #[serde(default)]
    pub spec: InfraSpec,
    /// Observed state.
    #[serde(default)]
    pub status: InfraStatus,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Infra {
    /// Creates an infra with the given tasks and no previous execution.
    #[must_use]
    pub fn new(name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            spec: InfraSpec { tasks },
            status: InfraStatus::default(),
        }
    }

    /// Sets the last execution.
    #[must_use]
    pub fn with_last_execution(mut self, last_execution: ExecutionStatus) -> Self {
        self.status.last_execution = last_execution;
        self
    }

    /// Finds a task in the desired spec.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.spec.tasks.iter().find(|t| t.name == name)
    }

    /// Finds a task's record in the last execution.
    #[must_use]
    pub fn last_task_execution(&self, name: &str) -> Option<&TaskExecutionStatus> {
        self.status.last_execution.task(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backend_state_base64_serde() {
        let state = BackendState::new(b"tfstate".to_vec(), b"lock".to_vec());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"state": "dGZzdGF0ZQ==", "lock": "bG9jaw=="}));

        let parsed: BackendState = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_backend_state_tolerates_quoted_blob() {
        let parsed: BackendState =
            serde_json::from_str(r#"{"state": "\"dGZzdGF0ZQ==\""}"#).unwrap();
        assert_eq!(parsed.state, b"tfstate".to_vec());
        assert!(parsed.lock.is_empty());
    }

    #[test]
    fn test_task_record_fail_switches_variant() {
        let task = TaskSpec::new("vpc", "terraform");
        let mut record = TaskExecutionStatus::started_from_spec(&task, TaskStatus::Applied);
        record.fail(ErrorDetail::new("boom", "X"));

        assert_eq!(record.status, TaskStatus::ApplyError);
        assert!(record.finished_at.is_some());
        assert!(record.is_failure());
    }

    #[test]
    fn test_infra_deserialize_camel_case() {
        let infra: Infra = serde_json::from_value(serde_json::json!({
            "name": "network",
            "spec": {
                "tasks": [{
                    "name": "vpc",
                    "backend": "terraform",
                    "source": {"source": "oci://registry/vpc", "version": "1.5.0"},
                    "inputs": [{"key": "cidr", "value": "10.0.0.0/16"}],
                    "taskOutputs": [{"name": "vpc-outputs"}]
                }]
            }
        }))
        .unwrap();

        assert_eq!(infra.namespace, "default");
        let task = infra.task("vpc").unwrap();
        assert_eq!(task.source.version, "1.5.0");
        assert_eq!(task.task_outputs, vec![TaskOutputRef::new("vpc-outputs")]);
        assert!(infra.last_task_execution("vpc").is_none());
    }

    #[test]
    fn test_execution_status_finalize() {
        let mut status = ExecutionStatus::running();
        assert_eq!(status.status, ExecutionState::Running);

        status.finalize(ExecutionState::Success, None);
        assert_eq!(status.status, ExecutionState::Success);
        assert!(status.finished_at.is_some());
    }
}
