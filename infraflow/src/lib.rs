//! # Infraflow
//!
//! Dependency-ordered execution of infrastructure provisioning tasks.
//!
//! An infra declares tasks, each applied through a backend with inputs that
//! may reference outputs of other tasks. Infraflow provides:
//!
//! - **Interpolation**: `{{ origin.name.attribute }}` templates resolved against
//!   the current run or published task outputs
//! - **Level-synchronized scheduling**: every ready task of a round runs
//!   concurrently; the next round starts once the whole round has finished
//! - **Apply and destroy diffing**: tasks dropped from an infra are destroyed in
//!   reverse dependency order before its tasks are applied
//! - **Status streaming**: a cumulative snapshot after every task, then a
//!   terminal snapshot, forwarded to a control plane with retries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use infraflow::prelude::*;
//!
//! let pipeline = Pipeline::new(backends, reporter).with_config(PipelineConfig::from_env()?);
//! let (tx, rx) = status_channel();
//! let forwarder = StatusForwarder::new(reporter.clone()).spawn(rx);
//!
//! let status = pipeline.start(ExecutionAction::Apply, &infra, tx).await;
//! forwarder.await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod interpolation;
pub mod observability;
pub mod pipeline;
pub mod reporter;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        ApplyRequest, ApplyResult, Backend, BackendKind, BackendRegistry, DestroyRequest,
        TaskWorkdir,
    };
    pub use crate::config::{LogConfig, PipelineConfig};
    pub use crate::context::{ContextHandle, ExecutionContext, OutputItem, TaskOutputs};
    pub use crate::core::{
        error_codes, BackendState, ErrorDetail, ExecutionState, ExecutionStatus, Infra,
        TaskExecutionStatus, TaskInput, TaskSource, TaskSpec, TaskStatus,
    };
    pub use crate::errors::{
        BackendError, InfraflowError, InterpolationError, ReporterError, SchedulerError,
        ValidationError,
    };
    pub use crate::interpolation::{Interpolator, OriginRegistry, OriginResolver, ResolvedValue};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{DependencyGraph, ExecutionAction, ExecutionPlan, Pipeline};
    pub use crate::reporter::{
        status_channel, RetryingReporter, StatusForwarder, StatusReceiver, StatusReporter,
        StatusSender, TaskOutputRecord,
    };
}
