use criterion::{black_box, Criterion};
use idcompact::{PageAlloc, ParallelCompactTable, SystemAlloc};

use super::context;

const UNIVERSE: usize = 1 << 22;

pub fn run(c: &mut Criterion) {
    bench_construct(c);
    bench_reset(c);
}

fn bench_construct(c: &mut Criterion) {
    let ctx = context();
    let mut group = c.benchmark_group("lifecycle_construct");
    group.sample_size(10);

    group.bench_function("system_alloc_4m", |b| {
        b.iter(|| black_box(ParallelCompactTable::new_in(UNIVERSE, &ctx, SystemAlloc).unwrap()))
    });

    group.bench_function("page_alloc_4m", |b| {
        b.iter(|| black_box(ParallelCompactTable::new_in(UNIVERSE, &ctx, PageAlloc).unwrap()))
    });

    group.finish();
}

fn bench_reset(c: &mut Criterion) {
    let ctx = context();
    let mut table = ParallelCompactTable::new(UNIVERSE, &ctx).unwrap();
    let mut group = c.benchmark_group("lifecycle_reset");
    group.sample_size(10);

    group.bench_function("reset_4m", |b| {
        b.iter(|| {
            table.reset();
            black_box(table.num_items())
        })
    });

    group.finish();
}
