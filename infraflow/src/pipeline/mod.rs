//! Pipeline building and execution.
//!
//! This module provides:
//! - Dependency graphs for apply and destroy runs
//! - The level-synchronized scheduler
//! - Apply and destroy units of work
//! - Pre-flight validation and the run entry point

mod actions;
mod diff;
mod graph;
pub mod retry;
mod runner;
mod scheduler;
mod validation;

#[cfg(test)]
mod integration_tests;

pub use actions::{ApplyAction, DestroyAction};
pub use diff::{orphaned_tasks, recorded_tasks};
pub use graph::DependencyGraph;
pub use retry::{with_retry, with_retry_if, BackoffStrategy, JitterStrategy, RetryConfig, RetryState};
pub use runner::{ExecutionAction, ExecutionPlan, Pipeline};
pub use scheduler::{RunOutcome, Scheduler, TaskAction, TaskOutcome};
pub use validation::{is_valid_task_name, validate_infra, TASK_NAME_PATTERN};
