//! Demo scenario runner for the broker simulator.
//!
//! Loads a topology and a publish scenario from a JSON file, runs the
//! consumer loop against it, and prints consumer stats plus a metrics
//! snapshot when the backlog is drained.

use broker::metrics::Window;
use broker::Broker;
use clap::Parser;
use internals::BrokerConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulator", about = "Run a broker simulation scenario")]
struct Args {
    /// Path to the scenario JSON file
    #[arg(short, long, default_value = "apps/config/demo.json")]
    config: PathBuf,

    /// Stop waiting for the consumer after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Scenario {
    #[serde(default)]
    broker: BrokerConfig,
    queues: Vec<QueueDef>,
    #[serde(default)]
    consumer: ConsumerDef,
    publish: Vec<PublishDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueueDef {
    name: String,
    pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ConsumerDef {
    processing_delay_ms: u64,
    #[serde(default)]
    auto_scale: bool,
}

impl Default for ConsumerDef {
    fn default() -> Self {
        Self {
            processing_delay_ms: 2000,
            auto_scale: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PublishDef {
    routing_key: String,
    payload: String,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_count() -> u32 {
    1
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.config)?;
    let scenario: Scenario = serde_json::from_str(&raw)?;
    info!(config = %args.config.display(), "loaded scenario");

    let broker = Broker::new(scenario.broker.clone());
    for queue in &scenario.queues {
        broker.add_queue(&queue.name)?;
        broker.bind_queue(&queue.name, &queue.pattern)?;
    }

    // one consumer on the first declared queue, the reference layout
    let watched = scenario
        .queues
        .first()
        .map(|q| q.name.clone())
        .ok_or("scenario declares no queues")?;
    let consumer = broker.spawn_consumer(&watched)?;
    consumer.set_processing_delay(Duration::from_millis(scenario.consumer.processing_delay_ms))?;
    consumer.set_auto_scale(scenario.consumer.auto_scale);

    let mut consumed = consumer.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(Ok(msg)) = consumed.next().await {
            info!(uuid = %msg.uuid, payload = %msg.payload, "consumed");
        }
    });

    let mut published = 0u32;
    for publish in &scenario.publish {
        for _ in 0..publish.count {
            let receipt = broker.publish(&publish.routing_key, publish.payload.clone())?;
            published += 1;
            if receipt.delivered_count == 0 {
                warn!(routing_key = %publish.routing_key, "no binding matched, message dropped");
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    info!(published, "scenario published");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.timeout_secs);
    while broker.queue_depth(&watched)? > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                depth = broker.queue_depth(&watched)?,
                "timeout reached, draining the rest synchronously"
            );
            consumer.drain_all()?;
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let stats = consumer.stats();
    info!(
        processed = stats.processed_count,
        errors = stats.error_count,
        health = stats.health,
        avg_ms = format!("{:.0}", stats.avg_processing_ms),
        "consumer finished"
    );

    let now = SystemTime::now();
    let rates = broker.rates(now);
    info!(
        produced_per_min = rates.produced_per_min,
        consumed_per_min = rates.consumed_per_min,
        produced_avg_per_min = rates.produced_avg_per_min,
        consumed_avg_per_min = rates.consumed_avg_per_min,
        "rates"
    );

    let series = broker.time_series(&watched, Window::LastHour, now)?;
    if let Some(point) = series.last() {
        info!(
            produced = point.produced,
            consumed = point.consumed,
            depth = point.queue_depth,
            "current 5-minute bucket"
        );
    }

    consumer.shutdown();
    printer.abort();
    Ok(())
}
