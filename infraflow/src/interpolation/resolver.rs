//! Origin resolvers for interpolation variables.

use super::VariableRef;
use crate::context::ContextHandle;
use crate::errors::InterpolationError;
use crate::reporter::StatusReporter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Origin backed by the current run's execution context.
pub const THIS_ORIGIN: &str = "this";

/// Origin backed by task outputs published through the status reporter.
pub const TASK_OUTPUT_ORIGIN: &str = "task-output";

/// A resolved value and whether it must be treated as a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedValue {
    /// The value text.
    pub value: String,
    /// Whether the value is sensitive.
    pub sensitive: bool,
}

impl ResolvedValue {
    /// Creates a resolved value.
    #[must_use]
    pub fn new(value: impl Into<String>, sensitive: bool) -> Self {
        Self {
            value: value.into(),
            sensitive,
        }
    }

    /// Creates a value from a backend output, stripping the surrounding
    /// quotes backends leave on JSON-encoded strings.
    #[must_use]
    pub fn from_output(value: &str, sensitive: bool) -> Self {
        Self::new(value.trim_matches('"'), sensitive)
    }
}

/// Resolves `name.attribute` for one origin.
#[async_trait]
pub trait OriginResolver: Send + Sync {
    /// Looks up the value a variable refers to.
    async fn resolve(
        &self,
        variable: &VariableRef,
        ctx: &ContextHandle,
    ) -> Result<ResolvedValue, InterpolationError>;
}

/// Resolves against outputs of tasks completed earlier in the same run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThisOrigin;

#[async_trait]
impl OriginResolver for ThisOrigin {
    async fn resolve(
        &self,
        variable: &VariableRef,
        ctx: &ContextHandle,
    ) -> Result<ResolvedValue, InterpolationError> {
        let outputs = ctx
            .read(&variable.name)
            .ok_or_else(|| InterpolationError::TaskNotFound {
                task: variable.name.clone(),
            })?;
        let item = outputs
            .get(&variable.attribute)
            .ok_or_else(|| InterpolationError::AttributeNotFound {
                task: variable.name.clone(),
                attribute: variable.attribute.clone(),
            })?;

        Ok(ResolvedValue::from_output(&item.value, item.sensitive))
    }
}

/// Resolves against task outputs published by any infra in a namespace.
pub struct TaskOutputOrigin {
    reporter: Arc<dyn StatusReporter>,
    namespace: String,
}

impl TaskOutputOrigin {
    /// Creates a resolver reading published outputs from the given namespace.
    #[must_use]
    pub fn new(reporter: Arc<dyn StatusReporter>, namespace: impl Into<String>) -> Self {
        Self {
            reporter,
            namespace: namespace.into(),
        }
    }
}

impl fmt::Debug for TaskOutputOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOutputOrigin")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OriginResolver for TaskOutputOrigin {
    async fn resolve(
        &self,
        variable: &VariableRef,
        _ctx: &ContextHandle,
    ) -> Result<ResolvedValue, InterpolationError> {
        let record = self
            .reporter
            .get_task_output(&variable.name, &self.namespace)
            .await
            .map_err(|e| InterpolationError::External(e.to_string()))?;
        let item = record.item(&variable.attribute).ok_or_else(|| {
            InterpolationError::TaskOutputAttributeNotFound {
                name: variable.name.clone(),
                attribute: variable.attribute.clone(),
            }
        })?;

        Ok(ResolvedValue::from_output(&item.value, item.sensitive))
    }
}

/// Maps origin names to their resolvers.
#[derive(Clone, Default)]
pub struct OriginRegistry {
    resolvers: HashMap<String, Arc<dyn OriginResolver>>,
}

impl OriginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the `this` and `task-output` origins.
    #[must_use]
    pub fn with_defaults(reporter: Arc<dyn StatusReporter>, namespace: impl Into<String>) -> Self {
        Self::new()
            .with_origin(THIS_ORIGIN, Arc::new(ThisOrigin))
            .with_origin(
                TASK_OUTPUT_ORIGIN,
                Arc::new(TaskOutputOrigin::new(reporter, namespace)),
            )
    }

    /// Registers a resolver, replacing any previous one for the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>, resolver: Arc<dyn OriginResolver>) -> Self {
        self.register(origin, resolver);
        self
    }

    /// Registers a resolver in place.
    pub fn register(&mut self, origin: impl Into<String>, resolver: Arc<dyn OriginResolver>) {
        self.resolvers.insert(origin.into(), resolver);
    }

    /// Returns the resolver for an origin.
    #[must_use]
    pub fn get(&self, origin: &str) -> Option<Arc<dyn OriginResolver>> {
        self.resolvers.get(origin).cloned()
    }

    /// Returns true if the origin has a resolver.
    #[must_use]
    pub fn is_known(&self, origin: &str) -> bool {
        self.resolvers.contains_key(origin)
    }

    /// Returns the registered origin names, sorted.
    #[must_use]
    pub fn origins(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resolvers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for OriginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginRegistry")
            .field("origins", &self.origins())
            .finish()
    }
}
