use criterion::{black_box, Criterion, Throughput};
use idcompact::ParallelCompactTable;

use super::{context, frontier};

const UNIVERSE: usize = 1 << 22;
const EDGES: usize = 1 << 20;

pub fn run(c: &mut Criterion) {
    bench_populate(c);
    bench_map_edges(c);
}

fn bench_populate(c: &mut Criterion) {
    let ctx = context();
    let mut table = ParallelCompactTable::new(UNIVERSE, &ctx).unwrap();
    let ids = frontier(EDGES, UNIVERSE, EDGES / 8);

    let mut group = c.benchmark_group("sampling_populate");
    group.throughput(Throughput::Elements(EDGES as u64));

    group.bench_function("populate_then_reset", |b| {
        b.iter(|| {
            black_box(table.populate(&ids));
            table.reset();
        })
    });

    group.finish();
}

fn bench_map_edges(c: &mut Criterion) {
    let ctx = context();
    let table = ParallelCompactTable::new(UNIVERSE, &ctx).unwrap();
    let src = frontier(EDGES, UNIVERSE, EDGES / 8);
    let dst = frontier(EDGES, UNIVERSE, EDGES / 4);
    table.populate_edges(&src, &dst);
    let mut new_src = vec![0; EDGES];
    let mut new_dst = vec![0; EDGES];

    let mut group = c.benchmark_group("sampling_map_edges");
    group.throughput(Throughput::Elements(EDGES as u64));

    group.bench_function("map_edges_1m", |b| {
        b.iter(|| table.map_edges(&src, &dst, &mut new_src, &mut new_dst))
    });

    group.bench_function("map_nodes_all", |b| b.iter(|| black_box(table.mapped_nodes())));

    group.finish();
}
