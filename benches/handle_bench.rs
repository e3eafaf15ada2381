use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_handle::SharedHandle;
use std::rc::Rc;

fn bench_construct(c: &mut Criterion) {
    c.bench_function("shared_handle_new", |b| {
        b.iter(|| black_box(SharedHandle::new(black_box(42_u64))))
    });
    c.bench_function("shared_handle_from_box", |b| {
        b.iter(|| black_box(SharedHandle::from_box(Box::new(black_box(42_u64)))))
    });
    // Baseline: std's combined-allocation construction.
    c.bench_function("std_rc_new", |b| b.iter(|| black_box(Rc::new(black_box(42_u64)))));
}

fn bench_clone_drop(c: &mut Criterion) {
    c.bench_function("shared_handle_clone_drop", |b| {
        let h = SharedHandle::new(42_u64);
        b.iter(|| black_box(h.clone()))
    });
    c.bench_function("std_rc_clone_drop", |b| {
        let h = Rc::new(42_u64);
        b.iter(|| black_box(h.clone()))
    });
}

fn bench_lock(c: &mut Criterion) {
    c.bench_function("weak_handle_lock_live", |b| {
        let h = SharedHandle::new(42_u64);
        let w = h.downgrade();
        b.iter(|| black_box(w.lock()))
    });
    c.bench_function("weak_handle_lock_expired", |b| {
        let h = SharedHandle::new(42_u64);
        let w = h.downgrade();
        drop(h);
        b.iter(|| black_box(w.lock()))
    });
}

fn bench_group_teardown(c: &mut Criterion) {
    c.bench_function("shared_handle_teardown_1k", |b| {
        b.iter_batched(
            || {
                let h = SharedHandle::new(42_u64);
                let clones: Vec<_> = (0..1_000).map(|_| h.clone()).collect();
                (h, clones)
            },
            |group| drop(black_box(group)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_construct,
    bench_clone_drop,
    bench_lock,
    bench_group_teardown
);
criterion_main!(benches);
