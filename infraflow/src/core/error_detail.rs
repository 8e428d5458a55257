//! Coded error details carried by status records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes reported to the control plane.
pub mod error_codes {
    /// The infra failed pre-flight validation.
    pub const INVALID_INFRA: &str = "INVALID_INFRA";
    /// A task input could not be interpolated.
    pub const TASK_INPUT_INTERPOLATION_ERROR: &str = "TASK_INPUT_INTERPOLATION_ERROR";
    /// The task names a backend with no registered implementation.
    pub const INVALID_TASK_BACKEND: &str = "INVALID_TASK_BACKEND";
    /// The backend failed to apply the task.
    pub const TASK_APPLY_BACKEND_ERROR: &str = "TASK_APPLY_BACKEND_ERROR";
    /// The backend failed to destroy the task.
    pub const TASK_DESTROY_BACKEND_ERROR: &str = "TASK_DESTROY_BACKEND_ERROR";
    /// Publishing a task output group failed.
    pub const TASK_OUTPUT_CREATION_ERROR: &str = "TASK_OUTPUT_CREATION_ERROR";
    /// Retracting a task output group failed.
    pub const DESTROY_TASK_OUTPUTS_ERROR: &str = "DESTROY_TASK_OUTPUTS_ERROR";
    /// The scheduler could not make progress or lost a unit of work.
    pub const SCHEDULER_ERROR: &str = "SCHEDULER_ERROR";
    /// The run exceeded its time limit.
    pub const TIME_LIMIT_EXCEEDED: &str = "TIME_LIMIT_EXCEEDED";
}

/// An error message with a machine-readable code and a remediation tip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human readable message.
    pub message: String,
    /// Error code, one of [`error_codes`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Hint for fixing the error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tip: String,
}

impl ErrorDetail {
    /// Creates a new error detail.
    #[must_use]
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            tip: String::new(),
        }
    }

    /// Sets the remediation tip.
    #[must_use]
    pub fn with_tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = tip.into();
        self
    }

    /// Returns true if no error is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.code.is_empty()
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}
