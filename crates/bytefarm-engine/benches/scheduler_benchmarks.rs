//! Scheduler step cost.
//!
//! Measures one frame of scheduling against an in-memory source that never
//! runs dry, for the three frame kinds: dequeue, waiting, and apply. The
//! frame budget at 60 FPS is 16.67ms; a step should be far below a
//! microsecond.
//!
//! Run with: `cargo bench --bench scheduler_benchmarks`

use std::cell::Cell;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bytefarm_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Cycles through a fixed operation list forever.
struct LoopingSource {
    ops: Vec<Operation>,
    next: Cell<usize>,
}

impl LoopingSource {
    fn new(ops: Vec<Operation>) -> Self {
        Self {
            ops,
            next: Cell::new(0),
        }
    }
}

impl OperationSource for LoopingSource {
    fn is_running(&self) -> bool {
        true
    }

    fn poll_op(&self) -> Option<Operation> {
        let i = self.next.get();
        self.next.set((i + 1) % self.ops.len());
        self.ops.get(i).cloned()
    }

    fn op_done(&self) {}
}

fn field_work() -> Vec<Operation> {
    vec![
        Operation::Till,
        Operation::Plant {
            entity: EntityKind::Stone,
        },
        Operation::Collect,
        Operation::Move {
            direction: Direction::East,
        },
        Operation::Move {
            direction: Direction::West,
        },
    ]
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_step");

    for frame_ms in [1u64, 16, 500] {
        group.bench_with_input(
            BenchmarkId::new("field_work", frame_ms),
            &frame_ms,
            |b, &frame_ms| {
                let source = LoopingSource::new(field_work());
                let mut state = FarmState::new(5);
                let mut scheduler = TickScheduler::default();
                let mut tick = 0u64;
                b.iter(|| {
                    tick += frame_ms;
                    black_box(scheduler.step(&source, &mut state, black_box(tick)))
                });
            },
        );
    }

    group.finish();
}

fn bench_engine_frames(c: &mut Criterion) {
    c.bench_function("engine_idle_frame", |b| {
        let mut engine = FarmEngine::new(EngineConfig::default());
        b.iter(|| black_box(engine.advance(black_box(16))));
    });

    c.bench_function("state_hash_5x5", |b| {
        let engine = FarmEngine::new(EngineConfig::default());
        b.iter(|| black_box(engine.state_hash()));
    });
}

criterion_group!(benches, bench_step, bench_engine_frames);
criterion_main!(benches);
