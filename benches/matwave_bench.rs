use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use matwave::{whosmat, ConvertOptions, MatWaveParser};
use pprof::criterion::Output;

#[path = "../tests/fixtures/mod.rs"]
mod fixtures;

use fixtures::{waveform_array, MatWriter, WaveformSpec};

/// Builds a MAT file with `traces` waveforms of `npts` samples each.
fn create_mat_with_waveforms(traces: usize, npts: usize, compressed: bool) -> Vec<u8> {
    let specs: Vec<WaveformSpec> = (0..traces)
        .map(|i| {
            WaveformSpec::new(&format!("ST{:03}", i), npts)
                .misc("CALIB", fixtures::Value::scalar(1.5))
                .misc("CLIPPED", fixtures::Value::text("no"))
        })
        .collect();

    let writer = if compressed {
        MatWriter::new().compressed()
    } else {
        MatWriter::new()
    };
    writer.add("waveforms", &waveform_array(&specs)).build()
}

fn benchmark_convert(c: &mut Criterion, name: &str, traces: usize, npts: usize, compressed: bool) {
    let data = create_mat_with_waveforms(traces, npts, compressed);
    let size = data.len();
    let options = ConvertOptions::default();

    let mut group = c.benchmark_group(name);
    group.throughput(Throughput::Bytes(size as u64));
    if traces * npts >= 1_000_000 {
        group.sample_size(10);
    }

    group.bench_function(BenchmarkId::new(format!("{}x{}", traces, npts), size), |b| {
        b.iter(|| {
            let streams = MatWaveParser::from_bytes(black_box(&data), &options).unwrap();
            black_box(streams);
        });
    });

    group.finish();
}

fn benchmark_convert_small(c: &mut Criterion) {
    benchmark_convert(c, "convert_small", 10, 1_000, false);
}

fn benchmark_convert_many_traces(c: &mut Criterion) {
    benchmark_convert(c, "convert_many_traces", 1_000, 100, false);
}

fn benchmark_convert_large(c: &mut Criterion) {
    benchmark_convert(c, "convert_large", 20, 100_000, false);
}

fn benchmark_convert_compressed(c: &mut Criterion) {
    benchmark_convert(c, "convert_compressed", 20, 100_000, true);
}

fn benchmark_whosmat(c: &mut Criterion) {
    let data = create_mat_with_waveforms(1_000, 100, false);

    c.bench_function("whosmat_1000", |b| {
        b.iter(|| {
            let infos = whosmat(black_box(&data)).unwrap();
            black_box(infos);
        });
    });
}

fn benchmark_samples_frame(c: &mut Criterion) {
    let data = create_mat_with_waveforms(20, 10_000, false);
    let streams = MatWaveParser::from_bytes(&data, &ConvertOptions::default()).unwrap();

    c.bench_function("samples_frame_200k", |b| {
        b.iter(|| {
            let df = matwave::frame::samples_frame(black_box(&streams)).unwrap();
            black_box(df);
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(pprof::criterion::PProfProfiler::new(100, Output::Flamegraph(None)));
    targets =
        benchmark_convert_small,
        benchmark_convert_many_traces,
        benchmark_convert_large,
        benchmark_convert_compressed,
        benchmark_whosmat,
        benchmark_samples_frame
}
criterion_main!(benches);
