//! In-memory control plane.

use crate::core::ExecutionStatus;
use crate::errors::ReporterError;
use crate::reporter::{StatusReporter, TaskOutputRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Store {
    outputs: HashMap<(String, String), TaskOutputRecord>,
    executions: Vec<ExecutionStatus>,
    deleted: Vec<(String, String)>,
    reject_publish: bool,
}

/// Reporter fake that keeps task outputs and reported snapshots in memory.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    store: Mutex<Store>,
}

impl InMemoryReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every publish as if the namespace did not exist.
    #[must_use]
    pub fn with_publish_failure(self) -> Self {
        self.store.lock().reject_publish = true;
        self
    }

    /// Seeds a task output record.
    pub fn insert_task_output(&self, record: TaskOutputRecord) {
        self.store
            .lock()
            .outputs
            .insert((record.name.clone(), record.namespace.clone()), record);
    }

    /// Returns a stored task output record.
    #[must_use]
    pub fn task_output(&self, name: &str, namespace: &str) -> Option<TaskOutputRecord> {
        self.store
            .lock()
            .outputs
            .get(&(name.to_string(), namespace.to_string()))
            .cloned()
    }

    /// Returns every reported snapshot, in order.
    #[must_use]
    pub fn executions(&self) -> Vec<ExecutionStatus> {
        self.store.lock().executions.clone()
    }

    /// Returns `(name, namespace)` of every deleted task output, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.store.lock().deleted.clone()
    }
}

#[async_trait]
impl StatusReporter for InMemoryReporter {
    async fn get_task_output(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<TaskOutputRecord, ReporterError> {
        self.task_output(name, namespace)
            .ok_or_else(|| ReporterError::NotFound {
                kind: "task output".to_string(),
                name: name.to_string(),
            })
    }

    async fn apply_task_output(&self, output: TaskOutputRecord) -> Result<(), ReporterError> {
        let mut store = self.store.lock();
        if store.reject_publish {
            return Err(ReporterError::NotFound {
                kind: "namespace".to_string(),
                name: output.namespace,
            });
        }
        store
            .outputs
            .insert((output.name.clone(), output.namespace.clone()), output);
        Ok(())
    }

    async fn delete_task_output(&self, name: &str, namespace: &str) -> Result<(), ReporterError> {
        let mut store = self.store.lock();
        store
            .outputs
            .remove(&(name.to_string(), namespace.to_string()));
        store.deleted.push((name.to_string(), namespace.to_string()));
        Ok(())
    }

    async fn report_execution(&self, status: ExecutionStatus) -> Result<(), ReporterError> {
        self.store.lock().executions.push(status);
        Ok(())
    }
}
