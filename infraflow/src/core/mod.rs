//! Core data model: infra specs, execution records and status enums.

mod error_detail;
mod infra;
mod status;

pub use error_detail::{error_codes, ErrorDetail};
pub use infra::{
    BackendState, ExecutionStatus, Infra, InfraSpec, InfraStatus, TaskExecutionStatus,
    TaskInput, TaskOutputRef, TaskSource, TaskSpec,
};
pub use status::{ExecutionState, TaskStatus};
