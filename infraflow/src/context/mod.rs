//! Execution context store.
//!
//! This module provides:
//! - Per-task output values recorded once per run
//! - A shared, mutex-guarded handle used by the scheduler and task actions

mod execution;
mod outputs;

pub use execution::ContextHandle;
pub use outputs::{ExecutionContext, OutputItem, TaskOutputs};
