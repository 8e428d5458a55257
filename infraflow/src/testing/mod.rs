//! Testing utilities for infraflow pipelines.
//!
//! This module provides:
//! - [`RecordingBackend`], a scriptable backend that logs calls
//! - [`InMemoryReporter`], a control plane kept in memory
//! - Fixtures for building infras with previous executions

mod backend;
mod fixtures;
mod reporter;

pub use backend::{BackendCall, CallKind, RecordingBackend};
pub use fixtures::{applied_record, infra_with_history, task};
pub use reporter::InMemoryReporter;
