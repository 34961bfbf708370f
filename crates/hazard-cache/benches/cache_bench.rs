use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hazard_cache::{DescriptorsCache, KeyAndHash, DEFAULT_CAPACITY};
use hazard_tracing::{init_global_tracing, TracingConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn benchmark_lookups(c: &mut Criterion) {
    // HAZARD_LOG=hazard_cache=debug shows evictions.
    let _ = init_global_tracing(&TracingConfig::from_env());
    let cache = DescriptorsCache::<u64, u64>::new(DEFAULT_CAPACITY);
    let keys: Vec<_> = (0..DEFAULT_CAPACITY as u64).map(KeyAndHash::new).collect();
    for k in &keys {
        cache.add(k.clone(), &[0; 16]);
    }

    c.bench_function("cache_get_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(cache.get(&keys[i]))
        })
    });
}

fn benchmark_churn(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let keys: Vec<_> = (0..4096).map(|_| KeyAndHash::new(rng.gen_range(0..1024u64))).collect();

    c.bench_function("cache_add_with_eviction", |b| {
        b.iter(|| {
            let cache = DescriptorsCache::<u64, u64>::new(DEFAULT_CAPACITY);
            for k in &keys {
                if cache.get(k).is_none() {
                    cache.add(k.clone(), &[*k.key(); 8]);
                }
            }
            black_box(cache.len())
        })
    });
}

criterion_group!(benches, benchmark_lookups, benchmark_churn);
criterion_main!(benches);
