//! Task and execution status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a single task within an execution.
///
/// The optimistic variant (`Applied`/`Destroyed`) is assigned before the
/// backend call and replaced by the matching error variant on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task was applied successfully.
    Applied,
    /// Task failed while resolving inputs, applying or publishing outputs.
    ApplyError,
    /// Task was torn down successfully.
    Destroyed,
    /// Task failed while being torn down.
    DestroyError,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "APPLIED"),
            Self::ApplyError => write!(f, "APPLY_ERROR"),
            Self::Destroyed => write!(f, "DESTROYED"),
            Self::DestroyError => write!(f, "DESTROY_ERROR"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the status is one of the error variants.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ApplyError | Self::DestroyError)
    }

    /// Returns the error variant belonging to the same path.
    #[must_use]
    pub fn as_failure(&self) -> Self {
        match self {
            Self::Applied | Self::ApplyError => Self::ApplyError,
            Self::Destroyed | Self::DestroyError => Self::DestroyError,
        }
    }
}

/// The overall state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Execution is in progress.
    #[default]
    Running,
    /// Every scheduled task completed successfully.
    Success,
    /// Validation failed or a task failed.
    Error,
    /// The run exceeded its time limit.
    Timeout,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

impl ExecutionState {
    /// Returns true if the state is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}
