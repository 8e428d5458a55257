//! Error types for the infraflow pipeline.
//!
//! Each concern has its own enum; [`InfraflowError`] unifies them for callers
//! that drive a whole run. Task-scoped errors are converted into
//! [`ErrorDetail`](crate::core::ErrorDetail) records and never escape a run.

use thiserror::Error;

/// The main error type for infraflow operations.
#[derive(Debug, Error)]
pub enum InfraflowError {
    /// The infra failed pre-flight validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A template could not be interpolated.
    #[error("{0}")]
    Interpolation(#[from] InterpolationError),

    /// The execution context rejected a write.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A backend call failed.
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// A status reporter call failed.
    #[error("{0}")]
    Reporter(#[from] ReporterError),

    /// The scheduler could not complete the run.
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration could not be loaded or applied.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading configuration or installing the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// The rejected value.
        value: String,
    },

    /// The tracing subscriber could not be installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Errors produced while tokenizing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A `{{` was never closed, or a marker was opened inside another.
    #[error("unbalanced delimiter at offset {offset} in template {template:?}")]
    Unbalanced {
        /// Byte offset of the offending `{{`.
        offset: usize,
        /// The template being tokenized.
        template: String,
    },
}

/// Errors produced while resolving `{{ origin.name.attribute }}` markers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
    /// The template has unbalanced delimiters.
    #[error("invalid template for input {key}: {source}")]
    Lex {
        /// The input key holding the template.
        key: String,
        /// The tokenizer error.
        #[source]
        source: LexError,
    },

    /// A variable does not have exactly three non-empty segments.
    #[error("malformed input variable {key} with value {value}")]
    MalformedVariable {
        /// The input key holding the template.
        key: String,
        /// The raw template value.
        value: String,
    },

    /// The origin has no registered resolver.
    #[error("invalid origin type {origin}")]
    InvalidOrigin {
        /// The unknown origin.
        origin: String,
    },

    /// The referenced task has no entry in the execution context.
    #[error("not found task {task} in execution context")]
    TaskNotFound {
        /// The referenced task.
        task: String,
    },

    /// The referenced task has no such output attribute.
    #[error("not found attr {attribute} in finished task execution {task}")]
    AttributeNotFound {
        /// The referenced task.
        task: String,
        /// The missing attribute.
        attribute: String,
    },

    /// The published task output has no such key.
    #[error("not found attr {attribute} in task output {name}")]
    TaskOutputAttributeNotFound {
        /// The task output name.
        name: String,
        /// The missing attribute.
        attribute: String,
    },

    /// An external origin lookup failed; the message is propagated verbatim.
    #[error("{0}")]
    External(String),
}

impl InterpolationError {
    /// Creates a malformed variable error.
    #[must_use]
    pub fn malformed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedVariable {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Errors raised by the execution context store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A task's outputs were recorded twice in the same run.
    #[error("outputs of task {task} already recorded in this run")]
    AlreadyRecorded {
        /// The task name.
        task: String,
    },
}

/// Errors raised by backend implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No backend is registered for the discriminator.
    #[error("invalid task backend")]
    InvalidBackend {
        /// The unknown discriminator.
        backend: String,
    },

    /// Fetching the task source failed.
    #[error("failed to fetch source {source_ref}: {message}")]
    Source {
        /// The source location.
        source_ref: String,
        /// Failure description.
        message: String,
    },

    /// The backend tool failed.
    #[error("{0}")]
    Execution(String),

    /// Preparing the task working directory failed.
    #[error("workdir error: {0}")]
    Workdir(String),
}

impl BackendError {
    /// Creates an execution error.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// Errors raised by the status reporter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReporterError {
    /// The remote call failed (possibly transient).
    #[error("call {method} failed: {message}")]
    Call {
        /// The remote method.
        method: String,
        /// Failure description.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("not found {kind} {name}")]
    NotFound {
        /// Kind of resource.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// The receiving end of the status stream is gone.
    #[error("status stream closed")]
    Closed,
}

impl ReporterError {
    /// Creates a call failure.
    #[must_use]
    pub fn call(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Call {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the dependency scheduler itself.
///
/// Task failures are not scheduler errors; they are carried in the task's
/// status record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No node is ready while some remain unexecuted.
    #[error("scheduler stalled; remaining tasks: {}", pending.join(", "))]
    Stalled {
        /// Nodes that could never start.
        pending: Vec<String>,
    },

    /// A unit of work panicked or was aborted.
    #[error("task {task} did not complete: {message}")]
    Join {
        /// The node whose unit failed to join.
        task: String,
        /// Join failure description.
        message: String,
    },

    /// Recording a unit's outputs failed.
    #[error("{0}")]
    Context(#[from] ContextError),
}

/// Error raised when an infra fails pre-flight validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A task has an empty or unusable name.
    #[error(
        "invalid task name {name:?}: names must match [A-Za-z0-9][A-Za-z0-9_-]*, \
         since a dot would split origin.name.attribute references"
    )]
    InvalidTaskName {
        /// The offending name.
        name: String,
    },

    /// Two tasks share a name.
    #[error("duplicated task name {name}")]
    DuplicateTask {
        /// The duplicated name.
        name: String,
    },

    /// A dependency names a task absent from the infra spec.
    #[error("not found the dependency {dependency} specified in task {task}")]
    MissingDependency {
        /// The referring task.
        task: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", cycle.join(" -> "))]
    Cycle {
        /// The tasks forming the cycle, first repeated at the end.
        cycle: Vec<String>,
    },

    /// An input template cannot be tokenized.
    #[error("invalid template for input {key} in task {task}: {source}")]
    Template {
        /// The task owning the input.
        task: String,
        /// The input key.
        key: String,
        /// The tokenizer error.
        #[source]
        source: LexError,
    },

    /// An interpolation variable does not have three segments.
    #[error("malformed input variable {key} with value {value}")]
    MalformedVariable {
        /// The input key.
        key: String,
        /// The raw value.
        value: String,
    },

    /// An interpolation variable uses an unknown origin.
    #[error("invalid origin: {origin} for input {key} interpolation with value {value}")]
    InvalidOrigin {
        /// The unknown origin.
        origin: String,
        /// The input key.
        key: String,
        /// The raw value.
        value: String,
    },

    /// A `this` reference names a task absent from the infra spec.
    #[error("invalid name: {name} in origin this for input {key} interpolation with value {value}")]
    UnknownReference {
        /// The referenced task.
        name: String,
        /// The input key.
        key: String,
        /// The raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_error_messages() {
        let err = InterpolationError::malformed("subnet", "{{ this.vpc }}");
        assert_eq!(
            err.to_string(),
            "malformed input variable subnet with value {{ this.vpc }}"
        );

        let err = InterpolationError::TaskNotFound { task: "vpc".into() };
        assert_eq!(err.to_string(), "not found task vpc in execution context");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MissingDependency {
            task: "subnet".into(),
            dependency: "vpc".into(),
        };
        assert_eq!(
            err.to_string(),
            "not found the dependency vpc specified in task subnet"
        );

        let err = ValidationError::Cycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_unified_error_conversion() {
        let err: InfraflowError = BackendError::execution("terraform exited 1").into();
        assert!(matches!(err, InfraflowError::Backend(_)));
        assert_eq!(err.to_string(), "terraform exited 1");

        let err: InfraflowError = SchedulerError::Stalled {
            pending: vec!["a".into(), "b".into()],
        }
        .into();
        assert_eq!(err.to_string(), "scheduler stalled; remaining tasks: a, b");
    }
}
