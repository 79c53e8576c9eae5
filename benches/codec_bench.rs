//! Vector literal and statement construction benchmarks
//!
//! Every similarity search encodes its query vector and every embedding read
//! decodes a stored one, so both sit on the request path.

use catalog_similarity::vector_search::codec::{decode, encode};
use catalog_similarity::vector_search::{CatalogKind, Dialect, SimilarityQueryBuilder};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uuid::Uuid;

fn embedding(dimensions: usize) -> Vec<f32> {
    (0..dimensions).map(|i| (i as f32 * 0.731).sin() * 0.5).collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_encode");

    for dimensions in [384, 1024, 1536].iter() {
        let vector = embedding(*dimensions);
        group.throughput(Throughput::Elements(*dimensions as u64));

        group.bench_with_input(BenchmarkId::from_parameter(dimensions), &vector, |b, vector| {
            b.iter(|| {
                let literal = encode(black_box(vector)).expect("finite embedding");
                black_box(literal);
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_decode");

    for dimensions in [384, 1024, 1536].iter() {
        let literal = encode(&embedding(*dimensions)).expect("finite embedding");
        group.throughput(Throughput::Bytes(literal.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(dimensions), &literal, |b, literal| {
            b.iter(|| {
                let vector = decode(black_box(literal)).expect("valid literal");
                black_box(vector);
            });
        });
    }

    group.finish();
}

fn bench_build_query(c: &mut Criterion) {
    let vector = embedding(1024);
    let exclude = Uuid::new_v4();

    c.bench_function("build_filtered_query_1024", |b| {
        b.iter(|| {
            let statement = SimilarityQueryBuilder::new(
                CatalogKind::MediaItems,
                Dialect::Postgres,
                black_box(&vector),
            )
            .exclude_id(Some(exclude))
            .filter(Some("Book"))
            .limit(10)
            .build()
            .expect("finite embedding");
            black_box(statement);
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_build_query);
criterion_main!(benches);
