//! Performance benchmarks for the undo/redo engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rewind_undo_redo::{Command, Engine, EngineConfig, Scope, Scopes};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn increment(counter: &Arc<AtomicI64>) -> Command {
    let forward = Arc::clone(counter);
    let reverse = Arc::clone(counter);
    Command::builder("increment")
        .forward(move |_| {
            let counter = Arc::clone(&forward);
            async move { Ok(json!(counter.fetch_add(1, Ordering::Relaxed))) }
        })
        .reverse(move |_| {
            let counter = Arc::clone(&reverse);
            async move { Ok(json!(counter.fetch_sub(1, Ordering::Relaxed))) }
        })
        .build()
        .unwrap()
}

fn benchmark_enqueue(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::new().with_undo_limit(1000)).unwrap();
    let counter = Arc::new(AtomicI64::new(0));

    c.bench_function("enqueue_and_wait", |b| {
        b.iter(|| {
            let handle = engine.enqueue(increment(&counter)).unwrap();
            black_box(handle.wait_blocking().unwrap())
        })
    });

    c.bench_function("enqueue_batch_100", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..100)
                .map(|_| engine.enqueue(increment(&counter)).unwrap())
                .collect();
            for handle in handles {
                black_box(handle.wait_blocking().unwrap());
            }
        })
    });
}

fn benchmark_undo_redo(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::new()).unwrap();
    let counter = Arc::new(AtomicI64::new(0));
    engine
        .enqueue(increment(&counter))
        .unwrap()
        .wait_blocking()
        .unwrap();

    c.bench_function("undo_then_redo", |b| {
        b.iter(|| {
            engine.undo(None).unwrap().wait_blocking().unwrap();
            black_box(engine.redo(None).unwrap().wait_blocking().unwrap())
        })
    });
}

fn benchmark_scope_matching(c: &mut Criterion) {
    let names: Vec<String> = (0..20).map(|i| format!("scope{}", i)).collect();
    let scopes = Scopes::new(&names).unwrap();

    c.bench_function("scope_from_string", |b| {
        b.iter(|| black_box(scopes.scope_from_string(black_box("scope3, scope7 scope19"))))
    });

    let filter = scopes.scope_from_string("scope1,scope2,scope3").unwrap();
    let scope = scopes.scope("scope2").unwrap();
    c.bench_function("has_scope", |b| {
        b.iter(|| black_box(rewind_undo_redo::has_scope(black_box(filter), black_box(scope))))
    });
    c.bench_function("has_scope_wildcard", |b| {
        b.iter(|| black_box(Scope::All.matches(black_box(scope))))
    });
}

criterion_group!(
    benches,
    benchmark_enqueue,
    benchmark_undo_redo,
    benchmark_scope_matching
);
criterion_main!(benches);
