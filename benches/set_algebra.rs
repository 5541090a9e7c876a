//! Descriptor set algebra benchmark

use chunkstore::chunk::{n_way_intersect, n_way_union, sort_by_key, Descriptor};
use chunkstore::encoding::Encoding;
use chunkstore::model::{Metric, Time, METRIC_NAME_LABEL};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn descriptor(series: usize, hour: i64) -> Descriptor {
    let metric = Metric::new()
        .with_label(METRIC_NAME_LABEL, "http_requests_total")
        .with_label("instance", format!("host-{series}"));
    let from = Time(hour * 3_600_000);
    Descriptor::new("bench", metric, from, Time(from.0 + 3_599_999), Encoding::Delta)
        .with_checksum(series as u32)
}

/// `sets` lookup results, each a random sample of a shared universe.
fn lookup_results(sets: usize, universe: usize, per_set: usize) -> Vec<Vec<Descriptor>> {
    let mut rng = StdRng::seed_from_u64(42);
    let all: Vec<Descriptor> = (0..universe).map(|i| descriptor(i, (i % 24) as i64)).collect();
    (0..sets)
        .map(|_| {
            let picked = (0..per_set)
                .map(|_| all[rng.gen_range(0..universe)].clone())
                .collect();
            sort_by_key(picked)
        })
        .collect()
}

fn benchmark_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("n_way_union");

    for sets in [2, 8, 32] {
        let inputs = lookup_results(sets, 20_000, 2_000);
        let total: usize = inputs.iter().map(Vec::len).sum();
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sets), &inputs, |b, inputs| {
            b.iter(|| black_box(n_way_union(inputs)));
        });
    }

    group.finish();
}

fn benchmark_intersect(c: &mut Criterion) {
    let mut group = c.benchmark_group("n_way_intersect");

    for sets in [2, 8, 32] {
        let inputs = lookup_results(sets, 5_000, 2_500);
        let total: usize = inputs.iter().map(Vec::len).sum();
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sets), &inputs, |b, inputs| {
            b.iter(|| black_box(n_way_intersect(inputs)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_union, benchmark_intersect);

criterion_main!(benches);
