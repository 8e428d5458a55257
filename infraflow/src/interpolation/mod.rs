//! Template interpolation for task inputs.
//!
//! Input values may embed `{{ origin.name.attribute }}` markers. Every marker
//! in a value is resolved before any text is produced, so a failure never
//! leaves a partially substituted value behind. Resolved values are inserted
//! literally and are not tokenized again.

mod lexer;
mod resolver;
mod variable;

pub use lexer::{has_variables, tokenize, Token};
pub use resolver::{
    OriginRegistry, OriginResolver, ResolvedValue, TaskOutputOrigin, ThisOrigin,
    TASK_OUTPUT_ORIGIN, THIS_ORIGIN,
};
pub use variable::VariableRef;

use crate::context::ContextHandle;
use crate::core::TaskInput;
use crate::errors::InterpolationError;

enum Segment {
    Text(String),
    Variable(VariableRef),
}

/// Substitutes interpolation variables using a registry of origins.
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    origins: OriginRegistry,
}

impl Interpolator {
    /// Creates an interpolator over the given origins.
    #[must_use]
    pub fn new(origins: OriginRegistry) -> Self {
        Self { origins }
    }

    /// Returns the origin registry.
    #[must_use]
    pub fn origins(&self) -> &OriginRegistry {
        &self.origins
    }

    /// Renders one template value.
    ///
    /// `key` names the input holding the template and is used in errors.
    ///
    /// # Errors
    ///
    /// Returns an [`InterpolationError`] for unbalanced markers, malformed
    /// variables, unknown origins and failed lookups.
    pub async fn render(
        &self,
        key: &str,
        template: &str,
        ctx: &ContextHandle,
    ) -> Result<ResolvedValue, InterpolationError> {
        let segments = parse_segments(key, template)?;

        let mut resolved = Vec::with_capacity(segments.len());
        for segment in &segments {
            match segment {
                Segment::Text(text) => resolved.push(ResolvedValue::new(text.clone(), false)),
                Segment::Variable(variable) => {
                    let resolver = self.origins.get(&variable.origin).ok_or_else(|| {
                        InterpolationError::InvalidOrigin {
                            origin: variable.origin.clone(),
                        }
                    })?;
                    resolved.push(resolver.resolve(variable, ctx).await?);
                }
            }
        }

        Ok(ResolvedValue {
            sensitive: resolved.iter().any(|r| r.sensitive),
            value: resolved.into_iter().map(|r| r.value).collect(),
        })
    }

    /// Resolves every input of a task, in declaration order.
    ///
    /// A resolved input is sensitive if it was declared sensitive or any
    /// substituted value is sensitive.
    ///
    /// # Errors
    ///
    /// Returns the first [`InterpolationError`] encountered.
    pub async fn resolve_inputs(
        &self,
        inputs: &[TaskInput],
        ctx: &ContextHandle,
    ) -> Result<Vec<TaskInput>, InterpolationError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            let value = self.render(&input.key, &input.value, ctx).await?;
            resolved.push(TaskInput {
                key: input.key.clone(),
                value: value.value,
                sensitive: input.sensitive || value.sensitive,
            });
        }
        Ok(resolved)
    }
}

fn parse_segments(key: &str, template: &str) -> Result<Vec<Segment>, InterpolationError> {
    let tokens = tokenize(template).map_err(|source| InterpolationError::Lex {
        key: key.to_string(),
        source,
    })?;

    tokens
        .into_iter()
        .map(|token| match token {
            Token::Text(text) => Ok(Segment::Text(text)),
            Token::Variable(raw) => VariableRef::parse(&raw)
                .map(Segment::Variable)
                .ok_or_else(|| InterpolationError::malformed(key, template)),
        })
        .collect()
}
