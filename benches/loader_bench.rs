//! Benchmarks for batch and incremental filtering.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::explicit_iter_loop,
    missing_docs
)]

use std::sync::Arc;

use arrow::{
    array::{Float64Array, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tamiz::{
    BatchFilteredSource, Chain, FilteredSource, IncrementalFilteredSource, MemorySource,
    NormMethod, Normalize, RecordMap, Select,
};

fn create_source(rows: usize) -> MemorySource {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("score", DataType::Float64, false),
    ]));

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let ids: Vec<i32> = (0..rows as i32).collect();
    let names: Vec<String> = ids.iter().map(|i| format!("item_{i}")).collect();
    #[allow(clippy::cast_lossless)]
    let scores: Vec<f64> = ids.iter().map(|i| *i as f64 * 1.5).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(ids)),
            Arc::new(StringArray::from(names)),
            Arc::new(Float64Array::from(scores)),
        ],
    )
    .expect("Failed to create batch");

    MemorySource::new(vec![batch]).expect("Failed to create source")
}

fn pipeline() -> Chain {
    Chain::new()
        .then(Select::new(vec!["id", "score"]).rowwise())
        .then(Normalize::new(vec!["score"], NormMethod::ZScore))
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_filter");

    for size in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let source = create_source(size);
            b.iter(|| {
                let mut loader = BatchFilteredSource::new(source.clone(), pipeline());
                black_box(loader.data_set().expect("Failed to filter"))
            });
        });
    }

    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_filter");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let source = create_source(size);
            b.iter(|| {
                let mut loader = IncrementalFilteredSource::new(source.clone(), pipeline());
                let mut count = 0;
                while let Some(record) = loader.next_record().expect("Failed to filter") {
                    count += black_box(record).num_rows();
                }
                count
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_batch, bench_incremental);
criterion_main!(benches);
