//! Bundle serialization and envelope codec benchmarks.

use chrono::Utc;
use cloudsync_bench::{generate_bundle, random_data};
use cloudsync_protocol::{Envelope, WorkspaceBundle, SCHEMA_VERSION};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark bundle serialization by server count.
fn bench_bundle_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle");

    for (workspaces, servers) in [(1, 10), (5, 20), (20, 50)] {
        let bundle = generate_bundle(workspaces, servers);
        let json = bundle.to_json().unwrap();
        let label = format!("{}x{}", workspaces, servers);

        group.bench_with_input(BenchmarkId::new("to_json", &label), &bundle, |b, bundle| {
            b.iter(|| black_box(bundle.to_json().unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("parse", &label), &json, |b, json| {
            b.iter(|| black_box(WorkspaceBundle::parse(black_box(json)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark base64 envelope encoding and validation.
fn bench_envelope_codec(c: &mut Criterion) {
    let ciphertext = random_data(64 * 1024);
    let envelope = Envelope::encode(&[1; 12], &ciphertext, &[2; 16], SCHEMA_VERSION, Utc::now());
    let json = envelope.to_json().unwrap();

    c.bench_function("envelope_encode_64k", |b| {
        b.iter(|| {
            black_box(Envelope::encode(
                &[1; 12],
                black_box(&ciphertext),
                &[2; 16],
                SCHEMA_VERSION,
                Utc::now(),
            ))
        });
    });

    c.bench_function("envelope_decode_64k", |b| {
        b.iter(|| black_box(black_box(&envelope).decode().unwrap()));
    });

    c.bench_function("envelope_from_json_64k", |b| {
        b.iter(|| black_box(Envelope::from_json(black_box(&json)).unwrap()));
    });
}

criterion_group!(benches, bench_bundle_json, bench_envelope_codec);

criterion_main!(benches);
