use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use swr_resources::{
    HashMapStore, ManualClock, MokaStore, ResourceDescriptor, ResourceRegistry, Store, SwrEngine,
};
use tokio::runtime::Runtime;

mod common;
use common::{BenchConfig, FakeApi, KeyGenerator};

fn registry() -> ResourceRegistry {
    ResourceRegistry::builder()
        .add(
            ResourceDescriptor::new("user")
                .read("/users/:id")
                .cache_seconds(60),
        )
        .build()
        .expect("valid registry")
}

fn setup(store: Arc<dyn Store>, api: &FakeApi, clock: Arc<ManualClock>) -> SwrEngine {
    SwrEngine::builder(registry(), Arc::new(api.clone()))
        .store(store)
        .clock(clock)
        .build()
}

fn stores() -> Vec<(&'static str, Arc<dyn Store>)> {
    vec![
        ("hashmap", Arc::new(HashMapStore::new()) as Arc<dyn Store>),
        ("moka", Arc::new(MokaStore::default()) as Arc<dyn Store>),
    ]
}

/// Benchmark 1: Hot Cache (all fresh hits, pure read path)
fn bench_hot_cache(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hot_cache");
    group.sample_size(config.sample_size);
    group.throughput(Throughput::Elements(config.num_users as u64));

    let api = FakeApi::new(config.num_users as u64, config.api_latency_ms);
    let keys = KeyGenerator::new(config.num_users).sequential();

    for (name, store) in stores() {
        group.bench_with_input(BenchmarkId::new("read", name), &name, |b, _| {
            let engine = setup(store.clone(), &api, Arc::new(ManualClock::new(0)));

            // Pre-populate cache
            rt.block_on(async {
                for params in &keys {
                    let _ = engine.read("user", Some(params)).await;
                }
            });

            b.to_async(&rt).iter(|| async {
                for params in &keys {
                    let _ = black_box(engine.read("user", Some(params)).await);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark 2: Stale Cache (expired entries served while refreshes run)
fn bench_stale_cache(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("stale_cache");
    group.sample_size(config.sample_size);
    group.throughput(Throughput::Elements(config.num_users as u64));

    let api = FakeApi::new(config.num_users as u64, config.api_latency_ms);
    let keys = KeyGenerator::new(config.num_users).sequential();

    for (name, store) in stores() {
        group.bench_with_input(BenchmarkId::new("read", name), &name, |b, _| {
            let clock = Arc::new(ManualClock::new(0));
            let engine = setup(store.clone(), &api, clock.clone());

            rt.block_on(async {
                for params in &keys {
                    let _ = engine.read("user", Some(params)).await;
                }
            });

            b.to_async(&rt).iter(|| {
                // Every iteration starts with all entries expired
                clock.advance(Duration::from_secs(61));
                let engine = engine.clone();
                let keys = &keys;
                async move {
                    for params in keys {
                        let _ = black_box(engine.read("user", Some(params)).await);
                    }
                }
            });
        });
    }

    group.finish();
}

/// Benchmark 3: Cold Cache (all misses, blocking fetches)
fn bench_cold_cache(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cold_cache");
    group.sample_size(config.sample_size.min(20)); // Fewer samples due to API latency
    group.measurement_time(Duration::from_secs(30));

    let api = FakeApi::new(config.num_users as u64, config.api_latency_ms);
    let keys = KeyGenerator::new(config.num_users).sequential();

    for (name, store) in stores() {
        let engine = setup(store, &api, Arc::new(ManualClock::new(0)));

        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| {
                let engine = engine.clone();
                let keys = &keys;
                async move {
                    let _ = engine.invalidate_all().await;
                    for params in keys.iter().take(10) {
                        let _ = black_box(engine.read("user", Some(params)).await);
                    }
                }
            });
        });
    }

    group.finish();
}

/// Benchmark 4: Concurrent cold reads of few hot keys (deduplicated fetches)
fn bench_concurrent_zipf(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_zipf");
    group.sample_size(config.sample_size.min(50));

    let api = FakeApi::new(config.num_users as u64, config.api_latency_ms);
    let key_gen = KeyGenerator::new(config.num_users);
    let engine = setup(
        Arc::new(MokaStore::default()),
        &api,
        Arc::new(ManualClock::new(0)),
    );

    group.bench_function("moka", |b| {
        b.to_async(&rt).iter(|| {
            let engine = engine.clone();
            let keys = key_gen.zipf_random(200);
            async move {
                let _ = engine.invalidate_all().await;
                let reads = keys.iter().map(|params| engine.read("user", Some(params)));
                black_box(futures::future::join_all(reads).await);
            }
        });
    });

    group.finish();
}

fn run_benchmarks(c: &mut Criterion) {
    let config = BenchConfig::from_env();

    eprintln!("\n=== Running Benchmarks ===\n");

    bench_hot_cache(c, &config);
    bench_stale_cache(c, &config);
    bench_cold_cache(c, &config);
    bench_concurrent_zipf(c, &config);
}

criterion_group!(benches, run_benchmarks);
criterion_main!(benches);
