//! Throughput of dependency computation
//!
//! Compares strided footprints submitted as linear row lists against the same
//! footprints compressed into cyclic ranges.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hazard_core::{
    CyclicDataRange, DataRange, Overlap, OverlapDescriptor, OverlapRoi, OverlapSubRoi, MAX_CYCLIC_STRIDE,
    MIN_RANGES_FOR_CYCLIC,
};
use hazard_tracing::{init_global_tracing, TracingConfig};

const ENGINES: usize = 8;

fn strided_rows(base: u64, rows: u64, pitch: u64, width: u64) -> Vec<DataRange<u64>> {
    (0..rows)
        .map(|row| DataRange::new(base + row * pitch, base + row * pitch + width))
        .collect()
}

fn descriptor_stream(rows: u64, compress: bool) -> Vec<OverlapDescriptor> {
    (0..256u64)
        .map(|i| {
            let engine = (i % ENGINES as u64) as u32;
            let mut sub_roi = OverlapSubRoi::linear(strided_rows((i % 16) * 64, rows, 1024, 64));
            if compress {
                sub_roi.compress(MIN_RANGES_FOR_CYCLIC, MAX_CYCLIC_STRIDE);
            }
            let roi = OverlapRoi::new(vec![sub_roi]);
            if i % 3 == 0 {
                OverlapDescriptor::new(engine, 1).output(roi)
            } else {
                OverlapDescriptor::new(engine, 1).input(roi)
            }
        })
        .collect()
}

fn benchmark_descriptor_streams(c: &mut Criterion) {
    // HAZARD_PERF_THRESHOLD_US turns on per-call timing.
    let _ = init_global_tracing(&TracingConfig::from_env());
    let mut group = c.benchmark_group("add_descriptor");
    for rows in [16u64, 128, 512] {
        for (label, compress) in [("linear", false), ("cyclic", true)] {
            let stream = descriptor_stream(rows, compress);
            group.bench_with_input(BenchmarkId::new(label, rows), &stream, |b, stream| {
                b.iter(|| {
                    let mut overlap = Overlap::<ENGINES>::new();
                    for desc in stream {
                        black_box(overlap.add_descriptor(desc, None));
                    }
                })
            });
        }
    }
    group.finish();
}

fn benchmark_cyclic_overlap(c: &mut Criterion) {
    let same_stride = (
        CyclicDataRange::new(100, 200, 1024).unwrap(),
        CyclicDataRange::new(180, 800, 1024).unwrap(),
    );
    let mixed_stride = (
        CyclicDataRange::new(0, 64, 260).unwrap(),
        CyclicDataRange::new(128, 256, 256).unwrap(),
    );

    c.bench_function("cyclic_overlap_same_stride", |b| {
        b.iter(|| black_box(same_stride.0).is_overlap(black_box(&same_stride.1)))
    });
    c.bench_function("cyclic_overlap_mixed_stride", |b| {
        b.iter(|| black_box(mixed_stride.0).is_overlap(black_box(&mixed_stride.1)))
    });
    c.bench_function("cyclic_overlap_window", |b| {
        b.iter(|| black_box(mixed_stride.0).is_overlap_in(black_box(&mixed_stride.1), 0, 4096))
    });
}

criterion_group!(benches, benchmark_descriptor_streams, benchmark_cyclic_overlap);
criterion_main!(benches);
