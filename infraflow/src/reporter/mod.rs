//! Boundary to the control plane.
//!
//! This module provides:
//! - The [`StatusReporter`] contract for task outputs and execution status
//! - [`RetryingReporter`], which retries transient failures with backoff
//! - [`StatusForwarder`], which drains the status stream into a reporter

mod forwarder;
mod retrying;

pub use forwarder::StatusForwarder;
pub use retrying::RetryingReporter;

use crate::core::ExecutionStatus;
use crate::errors::ReporterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sending half of the status stream.
pub type StatusSender = mpsc::UnboundedSender<ExecutionStatus>;

/// Receiving half of the status stream.
pub type StatusReceiver = mpsc::UnboundedReceiver<ExecutionStatus>;

/// Creates a status stream.
#[must_use]
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// One key of a published task output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutputItem {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
    /// Whether the value is a secret.
    #[serde(default)]
    pub sensitive: bool,
}

impl TaskOutputItem {
    /// Creates a non-sensitive item.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    /// Marks the item as sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A task output group as stored by the control plane.
///
/// Published after a successful apply and retracted when the owning task is
/// destroyed. Other infras read it through the `task-output` origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutputRecord {
    /// Output group name.
    pub name: String,
    /// Namespace the group lives in.
    pub namespace: String,
    /// Infra that published the group.
    #[serde(default)]
    pub infra_name: String,
    /// Task that produced the values.
    #[serde(default)]
    pub task_name: String,
    /// Output values.
    #[serde(default)]
    pub items: Vec<TaskOutputItem>,
}

impl TaskOutputRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Sets the producing infra and task.
    #[must_use]
    pub fn with_owner(mut self, infra: impl Into<String>, task: impl Into<String>) -> Self {
        self.infra_name = infra.into();
        self.task_name = task.into();
        self
    }

    /// Adds an item.
    #[must_use]
    pub fn with_item(mut self, item: TaskOutputItem) -> Self {
        self.items.push(item);
        self
    }

    /// Finds an item by key.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&TaskOutputItem> {
        self.items.iter().find(|i| i.key == key)
    }

    /// Returns true if any item is sensitive.
    #[must_use]
    pub fn has_sensitive(&self) -> bool {
        self.items.iter().any(|i| i.sensitive)
    }
}

/// Calls the pipeline makes into the control plane.
///
/// Implementations own the transport. Wrap them in [`RetryingReporter`] to
/// retry transient failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Fetches a published task output group.
    async fn get_task_output(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<TaskOutputRecord, ReporterError>;

    /// Creates or replaces a task output group.
    async fn apply_task_output(&self, output: TaskOutputRecord) -> Result<(), ReporterError>;

    /// Deletes a task output group.
    async fn delete_task_output(&self, name: &str, namespace: &str) -> Result<(), ReporterError>;

    /// Reports a cumulative execution snapshot.
    async fn report_execution(&self, status: ExecutionStatus) -> Result<(), ReporterError>;
}

#[async_trait]
impl<T: StatusReporter + ?Sized> StatusReporter for std::sync::Arc<T> {
    async fn get_task_output(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<TaskOutputRecord, ReporterError> {
        (**self).get_task_output(name, namespace).await
    }

    async fn apply_task_output(&self, output: TaskOutputRecord) -> Result<(), ReporterError> {
        (**self).apply_task_output(output).await
    }

    async fn delete_task_output(&self, name: &str, namespace: &str) -> Result<(), ReporterError> {
        (**self).delete_task_output(name, namespace).await
    }

    async fn report_execution(&self, status: ExecutionStatus) -> Result<(), ReporterError> {
        (**self).report_execution(status).await
    }
}
