//! Builders for infras and execution records.

use crate::core::{
    BackendState, ExecutionState, ExecutionStatus, Infra, TaskExecutionStatus, TaskSpec,
    TaskStatus,
};

/// A terraform task with the given dependencies.
#[must_use]
pub fn task(name: &str, depends: &[&str]) -> TaskSpec {
    depends
        .iter()
        .fold(TaskSpec::new(name, "terraform"), |spec, dep| {
            spec.with_dependency(*dep)
        })
}

/// A finished APPLIED record for `spec`, with state `state:{name}`.
#[must_use]
pub fn applied_record(spec: &TaskSpec) -> TaskExecutionStatus {
    let mut record = TaskExecutionStatus::started_from_spec(spec, TaskStatus::Applied);
    record.backend_state = BackendState::new(format!("state:{}", spec.name), Vec::new());
    record.finish();
    record
}

/// An infra whose last execution applied `history` successfully.
#[must_use]
pub fn infra_with_history(name: &str, tasks: Vec<TaskSpec>, history: &[TaskSpec]) -> Infra {
    let mut last = ExecutionStatus::running();
    last.tasks = history.iter().map(applied_record).collect();
    last.finalize(ExecutionState::Success, None);
    Infra::new(name, tasks).with_last_execution(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infra_with_history() {
        let infra = infra_with_history("net", vec![task("vpc", &[])], &[task("old", &["vpc"])]);

        let record = infra.last_task_execution("old").unwrap();
        assert_eq!(record.status, TaskStatus::Applied);
        assert_eq!(record.depends, vec!["vpc".to_string()]);
        assert_eq!(record.backend_state.state, b"state:old".to_vec());
        assert!(infra.task("old").is_none());
    }
}
