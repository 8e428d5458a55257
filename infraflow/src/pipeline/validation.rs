//! Pre-flight validation of an infra spec.

use super::DependencyGraph;
use crate::core::Infra;
use crate::errors::ValidationError;
use crate::interpolation::{tokenize, OriginRegistry, Token, VariableRef, THIS_ORIGIN};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Pattern every task name must match.
pub const TASK_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_-]*$";

/// Returns true if `name` is a usable task name.
#[must_use]
pub fn is_valid_task_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(TASK_NAME_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Checks an infra before anything runs.
///
/// Checks, in order: task names, duplicate names, missing dependencies,
/// dependency cycles, then every input template against `origins`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_infra(infra: &Infra, origins: &OriginRegistry) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for task in &infra.spec.tasks {
        if !is_valid_task_name(&task.name) {
            return Err(ValidationError::InvalidTaskName {
                name: task.name.clone(),
            });
        }
        if !names.insert(task.name.as_str()) {
            return Err(ValidationError::DuplicateTask {
                name: task.name.clone(),
            });
        }
    }

    for task in &infra.spec.tasks {
        if let Some(dep) = task.depends.iter().find(|d| !names.contains(d.as_str())) {
            return Err(ValidationError::MissingDependency {
                task: task.name.clone(),
                dependency: dep.clone(),
            });
        }
    }

    if let Some(cycle) = DependencyGraph::apply_graph(infra).detect_cycle() {
        return Err(ValidationError::Cycle { cycle });
    }

    for task in &infra.spec.tasks {
        for input in &task.inputs {
            let tokens = tokenize(&input.value).map_err(|source| ValidationError::Template {
                task: task.name.clone(),
                key: input.key.clone(),
                source,
            })?;

            for raw in tokens.iter().filter_map(|t| match t {
                Token::Variable(raw) => Some(raw),
                Token::Text(_) => None,
            }) {
                let variable =
                    VariableRef::parse(raw).ok_or_else(|| ValidationError::MalformedVariable {
                        key: input.key.clone(),
                        value: input.value.clone(),
                    })?;

                if !origins.is_known(&variable.origin) {
                    return Err(ValidationError::InvalidOrigin {
                        origin: variable.origin,
                        key: input.key.clone(),
                        value: input.value.clone(),
                    });
                }
                if variable.origin == THIS_ORIGIN && !names.contains(variable.name.as_str()) {
                    return Err(ValidationError::UnknownReference {
                        name: variable.name,
                        key: input.key.clone(),
                        value: input.value.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}
