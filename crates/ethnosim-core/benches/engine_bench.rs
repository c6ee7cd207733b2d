use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use ethnosim_core::{Distribution, SimulationConfig, SimulationEngine};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn bench_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");
    group.sample_size(env_or("ETHNOSIM_BENCH_SAMPLES", 30_usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("ETHNOSIM_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("ETHNOSIM_BENCH_MEASURE_SECS", 8)));
    let steps = env_or("ETHNOSIM_BENCH_STEPS", 32_usize).max(1);

    for side in [50_u32, 100, 200] {
        group.bench_function(format!("{side}x{side}_x{steps}"), |b| {
            b.iter_batched(
                || {
                    let mut engine = SimulationEngine::new(SimulationConfig {
                        grid_width: side,
                        grid_height: side,
                        rng_seed: Some(0xBEEF),
                        ..SimulationConfig::default()
                    })
                    .expect("engine");
                    engine.seed_by_distribution(&Distribution::EQUAL_MIX);
                    engine
                },
                |mut engine| {
                    for _ in 0..steps {
                        engine.tick();
                    }
                    engine
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ticks);
criterion_main!(benches);
