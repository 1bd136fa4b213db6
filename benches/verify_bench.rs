use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use vouch::crypto::{PublicKeySet, SecretKey};
use vouch::store::MemoryStore;
use vouch::types::StorePath;
use vouch::verify::{SilentProgress, Substituter, VerificationConfig, Verifier};

fn populate(store: &MemoryStore, count: usize, size: usize, key: Option<&SecretKey>) -> Vec<StorePath> {
    (0..count)
        .map(|i| {
            let nar: Vec<u8> = (0..size).map(|j| ((i + j) % 251) as u8).collect();
            let mut info = store.add(&format!("bench-{}", i), &nar).unwrap();
            if let Some(key) = key {
                info.sign(key);
                store.insert(info.clone(), nar);
            }
            info.path
        })
        .collect()
}

fn bench_content_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify/contents");
    let keys = PublicKeySet::new();
    let config = VerificationConfig {
        check_trust: false,
        ..VerificationConfig::default()
    };

    for size in [1024usize, 64 * 1024, 1024 * 1024].iter() {
        let store = MemoryStore::new("bench");
        let paths = populate(&store, 64, *size, None);
        group.throughput(Throughput::Bytes((*size * paths.len()) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let verifier = Verifier::new(&store, &keys, &config, &SilentProgress);
            b.iter(|| black_box(verifier.verify_paths(&paths).unwrap()));
        });
    }

    group.finish();
}

fn bench_signature_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify/signatures");
    let key = SecretKey::from_seed("bench-1", &[7; 32]).unwrap();
    let keys = PublicKeySet::from_keys([key.to_public_key()]);
    let config = VerificationConfig {
        check_contents: false,
        sigs_needed: 1,
        ..VerificationConfig::default()
    };

    for count in [100usize, 1000].iter() {
        let store = MemoryStore::new("bench");
        let paths = populate(&store, *count, 16, Some(&key));
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            let verifier = Verifier::new(&store, &keys, &config, &SilentProgress);
            b.iter(|| black_box(verifier.verify_paths(&paths).unwrap()));
        });
    }

    group.finish();
}

fn bench_slow_substituter(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify/substituter_latency");
    group.sample_size(10);

    let key = SecretKey::from_seed("cache-1", &[9; 32]).unwrap();
    let keys = PublicKeySet::from_keys([key.to_public_key()]);
    let local = MemoryStore::new("local");
    let paths = populate(&local, 32, 16, None);

    let mirror = MemoryStore::new("mirror").with_latency(Duration::from_millis(1));
    for path in &paths {
        let mut info = vouch::Store::query_path_info(&local, path).unwrap();
        info.sign(&key);
        mirror.insert(info, Vec::new());
    }
    let config = VerificationConfig {
        check_contents: false,
        sigs_needed: 1,
        substituters: vec![Substituter::new(Box::new(mirror))],
        ..VerificationConfig::default()
    };

    for threads in [1usize, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            let verifier =
                Verifier::new(&local, &keys, &config, &SilentProgress).with_threads(threads);
            b.iter(|| black_box(verifier.verify_paths(&paths).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_content_check,
    bench_signature_check,
    bench_slow_substituter
);
criterion_main!(benches);
