//! Shared run state guarded by a single mutex.
//!
//! The execution context and the scheduler's unresolved-dependency counts
//! live behind one lock. The lock is only taken for bookkeeping: recording a
//! finished task, decrementing its dependents, and short reads. Backend calls
//! never run while it is held.

use super::{ExecutionContext, TaskOutputs};
use crate::errors::ContextError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct RunState {
    context: ExecutionContext,
    pending: HashMap<String, usize>,
}

/// Cloneable handle onto one run's execution context.
///
/// Task actions receive a handle to read outputs of tasks completed in
/// earlier rounds. Only the scheduler completes tasks.
#[derive(Debug, Clone, Default)]
pub struct ContextHandle {
    state: Arc<Mutex<RunState>>,
}

impl ContextHandle {
    /// Creates a handle over an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle over an existing context.
    #[must_use]
    pub fn from_context(context: ExecutionContext) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState {
                context,
                pending: HashMap::new(),
            })),
        }
    }

    /// Creates a handle tracking the given unresolved-dependency counts.
    pub(crate) fn with_pending(pending: HashMap<String, usize>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState {
                context: ExecutionContext::new(),
                pending,
            })),
        }
    }

    /// Returns a copy of a task's outputs, if it completed.
    #[must_use]
    pub fn read(&self, task: &str) -> Option<TaskOutputs> {
        self.state.lock().context.read(task).cloned()
    }

    /// Returns true if the task has an entry.
    #[must_use]
    pub fn contains(&self, task: &str) -> bool {
        self.state.lock().context.contains(task)
    }

    /// Records a task's outputs without touching dependency counts.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::AlreadyRecorded`] if the task already has an entry.
    pub fn record(&self, task: impl Into<String>, outputs: TaskOutputs) -> Result<(), ContextError> {
        self.state.lock().context.record(task, outputs)
    }

    /// Returns a copy of the whole context.
    #[must_use]
    pub fn snapshot(&self) -> ExecutionContext {
        self.state.lock().context.clone()
    }

    /// Returns the number of recorded tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().context.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().context.is_empty()
    }

    /// Records a finished task and unblocks its dependents in one critical section.
    pub(crate) fn complete(
        &self,
        task: &str,
        outputs: TaskOutputs,
        dependents: &[String],
    ) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        state.context.record(task, outputs)?;
        for dependent in dependents {
            if let Some(count) = state.pending.get_mut(dependent) {
                *count = count.saturating_sub(1);
            }
        }
        Ok(())
    }

    /// Returns nodes, in the given order, with no unresolved dependency and no entry yet.
    pub(crate) fn ready(&self, order: &[String]) -> Vec<String> {
        let state = self.state.lock();
        order
            .iter()
            .filter(|node| {
                state.pending.get(*node).copied() == Some(0) && !state.context.contains(node)
            })
            .cloned()
            .collect()
    }

    /// Returns nodes, in the given order, that have no entry yet.
    pub(crate) fn unfinished(&self, order: &[String]) -> Vec<String> {
        let state = self.state.lock();
        order
            .iter()
            .filter(|node| !state.context.contains(node))
            .cloned()
            .collect()
    }
}
