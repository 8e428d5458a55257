//! Backend port.
//!
//! A backend turns a task's source and resolved inputs into real resources.
//! Concrete implementations (for example one shelling out to an
//! infrastructure-as-code tool) live outside this crate and are registered
//! per [`BackendKind`].

mod workdir;

pub use workdir::TaskWorkdir;

use crate::context::TaskOutputs;
use crate::core::{BackendState, TaskInput, TaskSource};
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// The closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Terraform / OpenTofu modules.
    Terraform,
}

impl BackendKind {
    /// Returns the discriminator used in task specs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terraform" => Ok(Self::Terraform),
            other => Err(BackendError::InvalidBackend {
                backend: other.to_string(),
            }),
        }
    }
}

/// Input to [`Backend::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    /// Task name.
    pub task: String,
    /// Where to fetch the task source.
    pub source: TaskSource,
    /// Resolved inputs.
    pub inputs: Vec<TaskInput>,
    /// State from the previous execution of the task, if any.
    pub previous: BackendState,
    /// Directory under which the backend creates its [`TaskWorkdir`].
    pub workdir_root: PathBuf,
}

/// Result of a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyResult {
    /// Output values keyed by name.
    pub outputs: TaskOutputs,
    /// State to persist for the next execution.
    pub state: BackendState,
}

/// Input to [`Backend::destroy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyRequest {
    /// Task name.
    pub task: String,
    /// Source the task was applied from.
    pub source: TaskSource,
    /// Inputs the task was applied with.
    pub inputs: Vec<TaskInput>,
    /// State recorded by the last apply.
    pub previous: BackendState,
    /// Directory under which the backend creates its [`TaskWorkdir`].
    pub workdir_root: PathBuf,
}

/// Applies and destroys tasks.
///
/// Implementations should give every call its own [`TaskWorkdir`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Creates or updates the task's resources.
    async fn apply(&self, request: ApplyRequest) -> Result<ApplyResult, BackendError>;

    /// Tears down the task's resources.
    async fn destroy(&self, request: DestroyRequest) -> Result<(), BackendError>;
}

/// Backend implementations keyed by kind.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend, replacing any previous one for the kind.
    #[must_use]
    pub fn with_backend(mut self, kind: BackendKind, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    /// Resolves a task's backend discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidBackend`] if the discriminator is
    /// unknown or has no registered implementation.
    pub fn resolve(&self, discriminator: &str) -> Result<Arc<dyn Backend>, BackendError> {
        let kind: BackendKind = discriminator.parse()?;
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| BackendError::InvalidBackend {
                backend: discriminator.to_string(),
            })
    }

    /// Returns the registered kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
