use std::env;
use std::str::FromStr;

/// Benchmark knobs, read from the environment.
///
/// | variable | default |
/// |---|---|
/// | `API_LATENCY_MS` | 20 |
/// | `BENCH_USERS` | 1000 |
/// | `BENCH_SAMPLE_SIZE` | 100 |
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub api_latency_ms: u64,
    pub num_users: usize,
    pub sample_size: usize,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl BenchConfig {
    pub fn from_env() -> Self {
        let config = BenchConfig {
            api_latency_ms: env_or("API_LATENCY_MS", 20),
            num_users: env_or("BENCH_USERS", 1000),
            sample_size: env_or("BENCH_SAMPLE_SIZE", 100),
        };
        eprintln!("{:#?}", config);
        config
    }
}
