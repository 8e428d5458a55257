//! Per-task output values recorded during a run.

use crate::errors::ContextError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single output value produced by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputItem {
    /// Output value as text.
    ///
    /// JSON-encoded strings may keep their quotes; interpolation strips
    /// surrounding `"` before substituting the value.
    pub value: String,
    /// Whether the value is a secret.
    #[serde(default)]
    pub sensitive: bool,
    /// Backend-reported type of the value.
    #[serde(default, rename = "type")]
    pub ty: String,
}

impl OutputItem {
    /// Creates a non-sensitive string output.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sensitive: false,
            ty: "string".to_string(),
        }
    }

    /// Marks the output as sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Sets the backend-reported type.
    #[must_use]
    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = ty.into();
        self
    }
}

/// Outputs of one task, keyed by output name.
pub type TaskOutputs = HashMap<String, OutputItem>;

/// Outputs of every task completed so far in one run.
///
/// Entries are write-once: recording the same task twice is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    entries: HashMap<String, TaskOutputs>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outputs of a task.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::AlreadyRecorded`] if the task already has an entry.
    pub fn record(
        &mut self,
        task: impl Into<String>,
        outputs: TaskOutputs,
    ) -> Result<(), ContextError> {
        let task = task.into();
        if self.entries.contains_key(&task) {
            return Err(ContextError::AlreadyRecorded { task });
        }
        self.entries.insert(task, outputs);
        Ok(())
    }

    /// Returns the outputs of a task, if it completed.
    #[must_use]
    pub fn read(&self, task: &str) -> Option<&TaskOutputs> {
        self.entries.get(task)
    }

    /// Returns a single output attribute of a task.
    #[must_use]
    pub fn attribute(&self, task: &str, key: &str) -> Option<&OutputItem> {
        self.entries.get(task).and_then(|outputs| outputs.get(key))
    }

    /// Returns true if the task has an entry.
    #[must_use]
    pub fn contains(&self, task: &str) -> bool {
        self.entries.contains_key(task)
    }

    /// Returns the number of recorded tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the recorded task names, sorted.
    #[must_use]
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}
