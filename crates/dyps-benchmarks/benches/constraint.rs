//! Constraint algebra benchmarks
//!
//! Parsing, intersection and matching are on the hot path of every selection
//! pass, so they are measured in isolation here.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dyps_benchmarks::criterion_config;
use dyps_core::{VersionConstraint, VersionId};

fn constraint_strings() -> Vec<String> {
    (0..100)
        .map(|i| match i % 5 {
            0 => format!("^{}.{}", i / 10, i % 10),
            1 => format!("~{}.{}.{}", i / 20, i % 7, i % 3),
            2 => format!(">={}.0, <{}.0", i / 10, i / 10 + 2),
            3 => format!("={}.{}", i / 10, i % 10),
            _ => "@main".to_string(),
        })
        .collect()
}

fn bench_constraint_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("constraint_parsing");
    let inputs = constraint_strings();
    let mut index = 0;

    group.bench_function("parse", |b| {
        b.iter(|| {
            let input = &inputs[index % inputs.len()];
            index += 1;
            black_box(VersionConstraint::parse(input))
        });
    });

    group.finish();
}

fn bench_constraint_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("constraint_intersection");

    for count in [2usize, 8, 32, 128] {
        group.throughput(Throughput::Elements(count as u64));

        // Nested ranges, so the intersection stays non-empty
        let constraints: Vec<VersionConstraint> = (0..count)
            .map(|i| {
                VersionConstraint::parse(&format!(">=1.{}, <{}.0", i % 10, 100 - (i % 50)))
                    .expect("constraint")
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("intersect_all", count), &count, |b, _| {
            b.iter(|| black_box(VersionConstraint::intersect_all(&constraints)));
        });
    }

    group.finish();
}

fn bench_constraint_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("constraint_matching");
    let constraints: Vec<VersionConstraint> = constraint_strings()
        .iter()
        .filter_map(|input| VersionConstraint::parse(input).ok())
        .collect();
    let versions: Vec<VersionId> = (0..100)
        .map(|i| VersionId::parse(&format!("{}.{}.{}", i / 10, i % 10, i % 3)))
        .collect();
    let mut index = 0;

    group.bench_function("matches", |b| {
        b.iter(|| {
            let constraint = &constraints[index % constraints.len()];
            let version = &versions[(index * 7) % versions.len()];
            index += 1;
            black_box(constraint.matches(version))
        });
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_constraint_parsing, bench_constraint_intersection, bench_constraint_matching
}
criterion_main!(benches);
