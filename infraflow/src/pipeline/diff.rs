//! Apply/destroy diffing against the last execution.

use crate::core::{Infra, TaskExecutionStatus, TaskStatus};
use std::collections::HashSet;

/// Returns the latest record of every task the last execution left standing.
///
/// Records are returned in first-seen order. Tasks whose latest record is a
/// successful destroy are skipped; a failed destroy is kept so it is retried.
#[must_use]
pub fn recorded_tasks(infra: &Infra) -> Vec<TaskExecutionStatus> {
    let last = &infra.status.last_execution;
    let mut seen = HashSet::new();

    last.tasks
        .iter()
        .filter(|record| seen.insert(record.name.as_str()))
        .filter_map(|record| last.task(&record.name))
        .filter(|record| record.status != TaskStatus::Destroyed)
        .cloned()
        .collect()
}

/// Returns recorded tasks that are no longer in the desired spec.
#[must_use]
pub fn orphaned_tasks(infra: &Infra) -> Vec<TaskExecutionStatus> {
    let desired: HashSet<&str> = infra.spec.tasks.iter().map(|t| t.name.as_str()).collect();

    recorded_tasks(infra)
        .into_iter()
        .filter(|record| !desired.contains(record.name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorDetail, ExecutionStatus, TaskSpec};

    fn record(name: &str, status: TaskStatus) -> TaskExecutionStatus {
        TaskExecutionStatus::started_from_spec(&TaskSpec::new(name, "terraform"), status)
    }

    fn names(records: &[TaskExecutionStatus]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_orphans_keep_last_execution_order() {
        let last = ExecutionStatus {
            tasks: vec![
                record("c", TaskStatus::Applied),
                record("a", TaskStatus::Applied),
                record("b", TaskStatus::Applied),
            ],
            ..ExecutionStatus::default()
        };
        let infra = Infra::new("net", vec![TaskSpec::new("a", "terraform")]).with_last_execution(last);

        assert_eq!(names(&orphaned_tasks(&infra)), vec!["c", "b"]);
    }

    #[test]
    fn test_destroyed_records_are_not_orphaned_again() {
        let mut failed = record("b", TaskStatus::Destroyed);
        failed.fail(ErrorDetail::new("boom", "X"));
        let last = ExecutionStatus {
            tasks: vec![record("a", TaskStatus::Destroyed), failed],
            ..ExecutionStatus::default()
        };
        let infra = Infra::new("net", Vec::new()).with_last_execution(last);

        let orphans = orphaned_tasks(&infra);
        assert_eq!(names(&orphans), vec!["b"]);
        assert_eq!(orphans[0].status, TaskStatus::DestroyError);
    }

    #[test]
    fn test_latest_record_wins() {
        let first = record("a", TaskStatus::Applied);
        let mut second = record("a", TaskStatus::Applied);
        second.depends = vec!["x".into()];
        let last = ExecutionStatus {
            tasks: vec![first, second],
            ..ExecutionStatus::default()
        };
        let infra = Infra::new("net", Vec::new()).with_last_execution(last);

        let records = recorded_tasks(&infra);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].depends, vec!["x".to_string()]);
    }

    #[test]
    fn test_no_orphans_without_history() {
        let infra = Infra::new("net", vec![TaskSpec::new("a", "terraform")]);
        assert!(orphaned_tasks(&infra).is_empty());
    }
}
