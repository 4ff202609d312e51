use allocguard::{run_guarded, run_guarded_async1, window, AllocGuard, CountingAllocator, GuardConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

fn bench_blocking_run(c: &mut Criterion) {
    c.bench_function("run_guarded_noop", |b| {
        b.iter(|| {
            black_box(run_guarded(|| black_box(1u64) + 1).unwrap());
        })
    });
}

fn bench_deferred_run(c: &mut Criterion) {
    c.bench_function("run_guarded_async1_wait", |b| {
        b.iter(|| {
            black_box(run_guarded_async1(|x: u64| x + 1, black_box(41)).wait().unwrap());
        })
    });
}

fn bench_capped_guard(c: &mut Criterion) {
    let guard = AllocGuard::new(GuardConfig::new().with_max_workers(1)).unwrap();
    c.bench_function("capped_guard_run", |b| {
        b.iter(|| {
            black_box(guard.run(|| black_box(2u32) * 21).unwrap());
        })
    });
}

fn bench_window_only(c: &mut Criterion) {
    c.bench_function("window_measure_inline", |b| {
        b.iter(|| {
            let (v, w) = window::measure(1, || black_box(3u32) * 14);
            black_box((v, w.allocated()));
        })
    });
}

criterion_group!(
    benches,
    bench_blocking_run,
    bench_deferred_run,
    bench_capped_guard,
    bench_window_only
);
criterion_main!(benches);
