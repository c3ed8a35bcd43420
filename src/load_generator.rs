use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sampling_metrics::{Counter, CounterMetric, Meter, MeterMetric, MetricsConfig, TimerMetric};

/// Demo run settings, read from the JSON file named on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// Number of concurrent Tokio tasks generating load
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// How long the run lasts (seconds)
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Percentage of operations that are reads (0–100)
    #[serde(default = "default_read_pct")]
    pub read_pct: u8,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_workers() -> u32 {
    10
}
fn default_duration() -> u64 {
    10
}
fn default_read_pct() -> u8 {
    70
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            duration_secs: default_duration(),
            read_pct: default_read_pct(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Everything the workers record into.
pub struct DemoMetrics {
    pub latency: TimerMetric,
    pub operations: CounterMetric,
    pub throughput: MeterMetric,
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `config.workers` Tokio tasks that simulate operations until the
/// deadline or the `running` flag is set to false.
pub async fn run(running: Arc<AtomicBool>, metrics: Arc<DemoMetrics>, config: LoadConfig) {
    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);

    let read_pct = config.read_pct;
    let mut handles = Vec::with_capacity(config.workers as usize);

    for worker_id in 0..config.workers {
        let running = running.clone();
        let metrics = metrics.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, metrics, deadline, read_pct).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    metrics: Arc<DemoMetrics>,
    deadline: Instant,
    read_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let is_read = rng.gen_range(0u8..100) < read_pct;

        let (endpoint, latency) = if is_read {
            let endpoint = if rng.gen_bool(0.6) { "GET /users/:id" } else { "GET /products/:id" };
            (endpoint, Duration::from_micros(rng.gen_range(200..2_000)))
        } else {
            let endpoint = if rng.gen_bool(0.5) { "POST /sessions" } else { "POST /users" };
            (endpoint, Duration::from_micros(rng.gen_range(500..5_000)))
        };

        simulate(&metrics, endpoint, is_read, latency).await;
    }
}

async fn simulate(metrics: &DemoMetrics, endpoint: &str, is_read: bool, latency: Duration) {
    let session = metrics.latency.new_context(Some(endpoint));
    tokio::time::sleep(latency).await;
    drop(session);

    metrics
        .operations
        .increment_item(if is_read { "read" } else { "write" }, 1);
    metrics.throughput.mark_item(endpoint, 1);
}
