//! End-to-end runs of the pipeline against in-memory fakes.

#[cfg(test)]
mod tests {
    use crate::config::PipelineConfig;
    use crate::core::{
        error_codes, ExecutionState, ExecutionStatus, Infra, TaskInput, TaskStatus,
    };
    use crate::pipeline::{ExecutionAction, Pipeline};
    use crate::reporter::{status_channel, StatusForwarder, TaskOutputItem, TaskOutputRecord};
    use crate::testing::{infra_with_history, task, InMemoryReporter, RecordingBackend};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        backend: RecordingBackend,
        reporter: Arc<InMemoryReporter>,
        config: PipelineConfig,
    }

    impl Harness {
        fn new(backend: RecordingBackend) -> Self {
            Self {
                backend,
                reporter: Arc::new(InMemoryReporter::new()),
                config: PipelineConfig::default(),
            }
        }

        fn with_reporter(mut self, reporter: InMemoryReporter) -> Self {
            self.reporter = Arc::new(reporter);
            self
        }

        fn with_config(mut self, config: PipelineConfig) -> Self {
            self.config = config;
            self
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(self.backend.registry(), self.reporter.clone())
                .with_config(self.config.clone())
        }

        async fn run(
            &self,
            action: ExecutionAction,
            infra: &Infra,
        ) -> (ExecutionStatus, Vec<ExecutionStatus>) {
            let (tx, mut rx) = status_channel();
            let status = self.pipeline().start(action, infra, tx).await;
            let mut snapshots = Vec::new();
            while let Some(snapshot) = rx.recv().await {
                snapshots.push(snapshot);
            }
            (status, snapshots)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_dependent_reads_dependency_output() {
        let harness = Harness::new(RecordingBackend::new().with_outputs("A", &[("x", "42")]));
        let infra = Infra::new(
            "net",
            vec![
                task("A", &[]),
                task("B", &["A"]).with_input(TaskInput::new("v", "{{ this.A.x }}")),
            ],
        );

        let (status, snapshots) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        assert_eq!(harness.backend.applied(), strings(&["A", "B"]));
        assert_eq!(harness.backend.calls()[1].inputs, vec![TaskInput::new("v", "42")]);
        assert_eq!(status.task("B").unwrap().inputs, vec![TaskInput::new("v", "42")]);

        let sizes: Vec<usize> = snapshots.iter().map(|s| s.tasks.len()).collect();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert_eq!(snapshots[0].status, ExecutionState::Running);
        assert_eq!(snapshots.last().unwrap(), &status);
    }

    #[tokio::test]
    async fn test_destroy_runs_in_reverse_dependency_order() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = infra_with_history(
            "net",
            Vec::new(),
            &[task("A", &[]), task("B", &["A"]), task("C", &["B"])],
        );

        let (status, snapshots) = harness.run(ExecutionAction::Destroy, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        assert_eq!(harness.backend.destroyed(), strings(&["C", "B", "A"]));
        assert_eq!(harness.backend.max_concurrency(), 1);
        assert!(status
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::Destroyed && t.backend_state.is_empty()));
        assert_eq!(snapshots.len(), 4);
    }

    #[tokio::test]
    async fn test_destroy_receives_recorded_state_and_inputs() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = infra_with_history(
            "net",
            Vec::new(),
            &[task("vpc", &[]).with_input(TaskInput::new("cidr", "10.0.0.0/16"))],
        );

        harness.run(ExecutionAction::Destroy, &infra).await;

        let call = &harness.backend.calls()[0];
        assert_eq!(call.inputs, vec![TaskInput::new("cidr", "10.0.0.0/16")]);
        assert_eq!(call.previous.state, b"state:vpc".to_vec());
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_state_for_next_destroy() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = infra_with_history(
            "net",
            vec![task("vpc", &[]).with_input(TaskInput::new("id", "{{ task-output.missing.id }}"))],
            &[task("vpc", &[])],
        );

        let (first, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(first.status, ExecutionState::Error);
        let failed = first.task("vpc").unwrap();
        assert_eq!(failed.status, TaskStatus::ApplyError);
        assert_eq!(failed.backend_state.state, b"state:vpc".to_vec());
        assert!(harness.backend.calls().is_empty());

        let next = Infra::new("net", Vec::new()).with_last_execution(first);
        let (second, _) = harness.run(ExecutionAction::Destroy, &next).await;

        assert_eq!(second.status, ExecutionState::Success);
        assert_eq!(harness.backend.destroyed(), strings(&["vpc"]));
        assert_eq!(harness.backend.calls()[0].previous.state, b"state:vpc".to_vec());
    }

    #[tokio::test]
    async fn test_failed_task_stops_dependents() {
        let harness = Harness::new(
            RecordingBackend::new()
                .with_apply_failure("A", "boom")
                .with_delay("C", Duration::from_millis(20)),
        );
        let infra = Infra::new(
            "net",
            vec![
                task("A", &[]),
                task("B", &["A"]).with_input(TaskInput::new("arn", "{{ this.A.arn }}")),
                task("C", &[]),
            ],
        );

        let (status, snapshots) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Error);
        let mut applied = harness.backend.applied();
        applied.sort();
        assert_eq!(applied, strings(&["A", "C"]));
        assert!(status.task("B").is_none());

        let failed = status.task("A").unwrap();
        assert_eq!(failed.status, TaskStatus::ApplyError);
        assert_eq!(status.error.as_ref(), failed.error.as_ref());
        assert_eq!(
            status.error.as_ref().unwrap().code,
            error_codes::TASK_APPLY_BACKEND_ERROR
        );
        assert_eq!(status.error.as_ref().unwrap().message, "boom");
        assert_eq!(snapshots.last().unwrap().status, ExecutionState::Error);
    }

    #[tokio::test]
    async fn test_interpolation_failure_fails_task() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = Infra::new(
            "net",
            vec![task("A", &[]).with_input(TaskInput::new("v", "{{ task-output.missing.key }}"))],
        );

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Error);
        assert!(harness.backend.calls().is_empty());
        let error = status.error.unwrap();
        assert_eq!(error.code, error_codes::TASK_INPUT_INTERPOLATION_ERROR);
        assert_eq!(error.tip, "Verify that the task inputs are valid");
    }

    #[tokio::test]
    async fn test_sensitivity_follows_substituted_values() {
        let harness = Harness::new(
            RecordingBackend::new()
                .with_outputs("db", &[("host", "db.local")])
                .with_sensitive_output("db", "password", "pw"),
        );
        let infra = Infra::new(
            "net",
            vec![
                task("db", &[]),
                task("app", &["db"])
                    .with_input(TaskInput::new("host", "{{ this.db.host }}"))
                    .with_input(TaskInput::new("dsn", "{{ this.db.host }}:{{ this.db.password }}")),
            ],
        );

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        let inputs = &harness.backend.calls()[1].inputs;
        assert_eq!(inputs[0], TaskInput::new("host", "db.local"));
        assert_eq!(inputs[1], TaskInput::new("dsn", "db.local:pw").sensitive());
    }

    #[tokio::test]
    async fn test_task_outputs_are_consumed_and_published() {
        let reporter = InMemoryReporter::new();
        reporter.insert_task_output(
            TaskOutputRecord::new("shared", "default")
                .with_item(TaskOutputItem::new("region", "eu-west-1")),
        );
        let harness = Harness::new(RecordingBackend::new().with_outputs("vpc", &[("id", "vpc-1")]))
            .with_reporter(reporter);
        let infra = Infra::new(
            "net",
            vec![task("vpc", &[])
                .with_input(TaskInput::new("region", "{{ task-output.shared.region }}"))
                .with_task_output("vpc-out")],
        );

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        assert_eq!(
            harness.backend.calls()[0].inputs,
            vec![TaskInput::new("region", "eu-west-1")]
        );
        let published = harness.reporter.task_output("vpc-out", "default").unwrap();
        assert_eq!(published.infra_name, "net");
        assert_eq!(published.task_name, "vpc");
        assert_eq!(published.items, vec![TaskOutputItem::new("id", "vpc-1")]);
    }

    #[tokio::test]
    async fn test_publish_failure_fails_task() {
        let harness = Harness::new(RecordingBackend::new())
            .with_reporter(InMemoryReporter::new().with_publish_failure());
        let infra = Infra::new("net", vec![task("vpc", &[]).with_task_output("vpc-out")]);

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Error);
        assert_eq!(
            status.error.unwrap().code,
            error_codes::TASK_OUTPUT_CREATION_ERROR
        );
        assert_eq!(status.tasks[0].backend_state.state, b"state:vpc".to_vec());
    }

    #[tokio::test]
    async fn test_validation_failure_runs_nothing() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = Infra::new("net", vec![task("A", &["B"]), task("B", &["A"])]);

        let (status, snapshots) = harness.run(ExecutionAction::Apply, &infra).await;

        assert!(harness.backend.calls().is_empty());
        assert_eq!(status.status, ExecutionState::Error);
        assert!(status.tasks.is_empty());
        assert_eq!(status.error.as_ref().unwrap().code, error_codes::INVALID_INFRA);
        assert_eq!(snapshots, vec![status]);
    }

    #[tokio::test]
    async fn test_unknown_origin_is_rejected_before_running() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = Infra::new(
            "net",
            vec![task("A", &[]).with_input(TaskInput::new("v", "{{ vault.db.password }}"))],
        );

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert!(harness.backend.calls().is_empty());
        assert_eq!(status.error.unwrap().code, error_codes::INVALID_INFRA);
    }

    #[tokio::test]
    async fn test_apply_destroys_orphans_first() {
        let harness = Harness::new(RecordingBackend::new());
        let infra = infra_with_history(
            "net",
            vec![task("vpc", &[])],
            &[task("vpc", &[]), task("cache", &["vpc"]).with_task_output("cache-out")],
        );

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        assert_eq!(harness.backend.destroyed(), strings(&["cache"]));
        assert_eq!(harness.backend.applied(), strings(&["vpc"]));
        assert_eq!(status.task_names(), vec!["cache", "vpc"]);
        assert_eq!(
            harness.reporter.deleted(),
            vec![("cache-out".to_string(), "default".to_string())]
        );

        let vpc_call = harness
            .backend
            .calls()
            .into_iter()
            .find(|c| c.task == "vpc")
            .unwrap();
        assert_eq!(vpc_call.previous.state, b"state:vpc".to_vec());
    }

    #[tokio::test]
    async fn test_failed_orphan_destroy_skips_apply() {
        let harness = Harness::new(RecordingBackend::new().with_destroy_failure("old", "in use"));
        let infra = infra_with_history("net", vec![task("vpc", &[])], &[task("old", &[])]);

        let (status, _) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Error);
        assert!(harness.backend.applied().is_empty());
        assert_eq!(status.task("old").unwrap().status, TaskStatus::DestroyError);
        assert_eq!(
            status.error.unwrap().code,
            error_codes::TASK_DESTROY_BACKEND_ERROR
        );
    }

    #[tokio::test]
    async fn test_independent_tasks_share_a_round() {
        let backend = ["a", "b", "c", "d"]
            .iter()
            .fold(RecordingBackend::new(), |backend, name| {
                backend.with_delay(name, Duration::from_millis(30))
            });
        let harness = Harness::new(backend);
        let infra = Infra::new(
            "net",
            vec![
                task("a", &[]),
                task("b", &[]),
                task("c", &[]),
                task("d", &[]),
                task("join", &["a", "b", "c", "d"]),
            ],
        );

        let (status, snapshots) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Success);
        assert_eq!(harness.backend.max_concurrency(), 4);
        assert_eq!(harness.backend.applied().last().unwrap(), "join");
        assert_eq!(snapshots.len(), 6);
        assert!(snapshots[..5]
            .iter()
            .all(|s| s.status == ExecutionState::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_produces_timeout() {
        let harness = Harness::new(RecordingBackend::new().with_delay("slow", Duration::from_secs(30)))
            .with_config(PipelineConfig::default().with_time_limit_secs(1));
        let infra = Infra::new("net", vec![task("slow", &[])]);

        let (status, snapshots) = harness.run(ExecutionAction::Apply, &infra).await;

        assert_eq!(status.status, ExecutionState::Timeout);
        let error = status.error.as_ref().unwrap();
        assert_eq!(error.code, error_codes::TIME_LIMIT_EXCEEDED);
        assert_eq!(error.message, "time limit exceeded");
        assert_eq!(snapshots.last().unwrap(), &status);
    }

    #[tokio::test]
    async fn test_workdirs_are_created_under_configured_root() {
        let root = tempfile::tempdir().unwrap();
        let harness = Harness::new(RecordingBackend::new().with_workdirs())
            .with_config(PipelineConfig::default().with_workdir_root(root.path()));
        let infra = Infra::new("net", vec![task("vpc", &[])]);

        harness.run(ExecutionAction::Apply, &infra).await;

        let workdir = harness.backend.calls()[0].workdir.clone().unwrap();
        assert!(workdir.starts_with(root.path()));
        assert!(!workdir.exists());
    }

    #[tokio::test]
    async fn test_forwarder_reports_every_snapshot() {
        let backend = RecordingBackend::new();
        let reporter = Arc::new(InMemoryReporter::new());
        let pipeline = Pipeline::new(backend.registry(), reporter.clone());
        let infra = Infra::new("net", vec![task("A", &[]), task("B", &["A"])]);

        let (tx, rx) = status_channel();
        let forwarder = StatusForwarder::new(reporter.clone()).spawn(rx);
        let status = pipeline.start(ExecutionAction::Apply, &infra, tx).await;
        let last = forwarder.await.unwrap().unwrap();

        assert_eq!(last, status);
        let reported = reporter.executions();
        assert_eq!(reported.len(), 3);
        assert_eq!(reported.last().unwrap().status, ExecutionState::Success);
    }
}
