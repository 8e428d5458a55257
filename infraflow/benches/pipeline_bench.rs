//! Benchmarks for interpolation and scheduling.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use infraflow::context::{ContextHandle, OutputItem, TaskOutputs};
use infraflow::core::{Infra, TaskInput};
use infraflow::interpolation::{tokenize, Interpolator, OriginRegistry};
use infraflow::pipeline::{DependencyGraph, ExecutionAction, Pipeline};
use infraflow::reporter::status_channel;
use infraflow::testing::{task, InMemoryReporter, RecordingBackend};
use std::sync::Arc;

const TEMPLATE: &str = "postgres://{{ this.db.user }}:{{ this.db.password }}@{{ this.db.host }}:5432/app";

fn interpolation_benchmark(c: &mut Criterion) {
    c.bench_function("tokenize", |b| b.iter(|| tokenize(black_box(TEMPLATE))));

    let Ok(rt) = tokio::runtime::Runtime::new() else {
        return;
    };
    let interpolator = Interpolator::new(OriginRegistry::with_defaults(
        Arc::new(InMemoryReporter::new()),
        "default",
    ));
    let ctx = ContextHandle::new();
    let mut outputs = TaskOutputs::new();
    outputs.insert("user".into(), OutputItem::new("app"));
    outputs.insert("password".into(), OutputItem::new("pw").sensitive());
    outputs.insert("host".into(), OutputItem::new("db.local"));
    if ctx.record("db", outputs).is_err() {
        return;
    }

    c.bench_function("render", |b| {
        b.iter(|| rt.block_on(interpolator.render("dsn", black_box(TEMPLATE), &ctx)))
    });
}

fn layered_infra(width: usize, depth: usize) -> Infra {
    let mut tasks = Vec::with_capacity(width * depth);
    for level in 0..depth {
        for i in 0..width {
            let name = format!("t{level}-{i}");
            let spec = if level == 0 {
                task(&name, &[])
            } else {
                let dep = format!("t{}-{i}", level - 1);
                task(&name, &[dep.as_str()])
                    .with_input(TaskInput::new("parent", format!("{{{{ this.{dep}.id }}}}")))
            };
            tasks.push(spec);
        }
    }
    Infra::new("bench", tasks)
}

fn scheduling_benchmark(c: &mut Criterion) {
    let infra = layered_infra(16, 8);

    c.bench_function("levels_16x8", |b| {
        b.iter(|| DependencyGraph::apply_graph(black_box(&infra)).levels())
    });

    let Ok(rt) = tokio::runtime::Runtime::new() else {
        return;
    };
    let backend = infra.spec.tasks.iter().fold(RecordingBackend::new(), |backend, t| {
        backend.with_outputs(&t.name, &[("id", t.name.as_str())])
    });
    let pipeline = Pipeline::new(backend.registry(), Arc::new(InMemoryReporter::new()));

    c.bench_function("apply_16x8", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (tx, _rx) = status_channel();
                pipeline.start(ExecutionAction::Apply, &infra, tx).await
            })
        })
    });
}

criterion_group!(benches, interpolation_benchmark, scheduling_benchmark);
criterion_main!(benches);
