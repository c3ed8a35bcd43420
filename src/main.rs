use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sampling_metrics::{
    default_clock, CounterMetric, CounterValue, HistogramMetric, MeterValue, MetricValueProvider,
    SamplingType, TimeUnit, TimerMetric, TimerValue,
};

mod load_generator;

use load_generator::{DemoMetrics, LoadConfig};

/// One line of the live report.
#[derive(Debug, Serialize)]
struct Report {
    elapsed_ms: u128,
    latency: TimerValue,
    operations: CounterValue,
    throughput: MeterValue,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   📈  SAMPLING METRICS DEMO                     ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Load configuration ────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(%path, error = %e, "could not load configuration");
                std::process::exit(1);
            }
        },
        None => LoadConfig::default(),
    };
    info!(
        workers = config.workers,
        duration_secs = config.duration_secs,
        read_pct = config.read_pct,
        "starting load"
    );

    // ── 2. Build metrics ─────────────────────────────────────────
    let clock = default_clock();
    let histogram = HistogramMetric::with_reservoir(
        config
            .metrics
            .build_reservoir(SamplingType::Default, clock.clone()),
    );
    let metrics = Arc::new(DemoMetrics {
        latency: TimerMetric::with_parts(histogram, config.metrics.build_meter(clock.clone()), clock.clone()),
        operations: CounterMetric::new(),
        throughput: config.metrics.build_meter(clock),
    });

    // ── 3. Start workers ─────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let started = Instant::now();
    let load = tokio::spawn(load_generator::run(
        running.clone(),
        metrics.clone(),
        config,
    ));

    // ── 4. Report every 500 ms until the load finishes ───────────
    let mut reports = IntervalStream::new(tokio::time::interval(Duration::from_millis(500)))
        .map(|_| Report {
            elapsed_ms: started.elapsed().as_millis(),
            latency: metrics
                .latency
                .value()
                .scale(TimeUnit::Seconds, TimeUnit::Milliseconds),
            operations: metrics.operations.value(),
            throughput: metrics.throughput.value(),
        });

    while running.load(Ordering::SeqCst) {
        let Some(report) = reports.next().await else {
            break;
        };
        println!("{}", serde_json::to_string(&report).unwrap_or_default());
    }

    if let Err(e) = load.await {
        error!(error = %e, "load generator task failed");
    }

    let total = metrics.latency.value().scale(TimeUnit::Seconds, TimeUnit::Milliseconds);
    let summary = total.histogram.summary();
    println!();
    if !summary.has_data() {
        println!("done: no operations recorded");
        return;
    }
    println!(
        "done: {} ops, mean {:.3} ms, p99 {:.3} ms, max {} ms",
        total.rate.count, summary.mean, summary.p99, summary.max
    );
}

fn load_config(path: &str) -> sampling_metrics::Result<LoadConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: LoadConfig = serde_json::from_str(&json)?;
    config.metrics.validate()?;
    Ok(config)
}
