use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use swr_resources::{Fetcher, Params, Request, ResourceError, Response};

/// Test data structure for benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

/// Simulated `GET /users/:id` API with configurable latency
#[derive(Clone)]
pub struct FakeApi {
    num_users: u64,
    latency_ms: u64,
    request_count: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn new(num_users: u64, latency_ms: u64) -> Self {
        Self {
            num_users,
            latency_ms,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Fetcher for FakeApi {
    async fn fetch(&self, request: &Request) -> Result<Response, ResourceError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        // Simulate network latency
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        let id = request
            .url
            .rsplit('/')
            .next()
            .and_then(|id| id.parse::<u64>().ok())
            .filter(|id| *id < self.num_users);

        Ok(match id {
            Some(id) => Response::new(200, json!(BenchUser::new(id))),
            None => Response::new(404, Value::Null),
        })
    }
}

/// Generate `{"id": n}` params for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    fn params(id: usize) -> Params {
        let mut params = Params::new();
        params.insert("id".to_string(), json!(id));
        params
    }

    /// Generate sequential params (for cold cache tests)
    pub fn sequential(&self) -> Vec<Params> {
        (0..self.num_keys).map(Self::params).collect()
    }

    /// Generate params with a Zipf-like distribution (few hot keys)
    #[allow(dead_code)]
    pub fn zipf_random(&self, count: usize) -> Vec<Params> {
        let mut rng = rand::thread_rng();

        (0..count)
            .map(|_| {
                // Simplified Zipf: 80% of requests go to 20% of keys
                let id = if rng.gen_bool(0.8) {
                    rng.gen_range(0..(self.num_keys / 5))
                } else {
                    rng.gen_range((self.num_keys / 5)..self.num_keys)
                };
                Self::params(id)
            })
            .collect()
    }
}
