use std::sync::Arc;

use clap::Parser;
use impact_core::HeuristicEstimator;
use impact_queue::HttpQueueClient;
use impact_worker::processor::{NoopProcessor, ProcessorRegistry};
use impact_worker::{Supervisor, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "impact-worker")]
#[command(about = "Impact assessment queue worker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Queue service endpoint
    #[arg(long, env = "QUEUE_ENDPOINT")]
    queue_endpoint: Option<String>,

    /// Queue to consume
    #[arg(long, env = "QUEUE_NAME")]
    queue_name: Option<String>,

    /// Health endpoint port
    #[arg(long, env = "HEALTH_PORT")]
    health_port: Option<u16>,

    /// Long-poll wait in seconds (max 20)
    #[arg(long, env = "RECEIVE_WAIT_SECONDS")]
    receive_wait: Option<u64>,

    /// Max seconds between heartbeats before the worker reads as hung
    #[arg(long, env = "HEARTBEAT_TIMEOUT")]
    heartbeat_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if let Some(path) = &args.config {
        WorkerConfig::from_file(path)?
    } else {
        WorkerConfig::default()
    };

    // Override with CLI args / environment
    if let Some(endpoint) = args.queue_endpoint {
        config.queue_endpoint = endpoint;
    }
    if let Some(name) = args.queue_name {
        config.queue_name = name;
    }
    if let Some(port) = args.health_port {
        config.health_port = port;
    }
    if let Some(wait) = args.receive_wait {
        config.receive_wait_secs = wait;
    }
    if let Some(timeout) = args.heartbeat_timeout {
        config.heartbeat_timeout_secs = timeout;
    }
    config.validate()?;

    let worker_id = config.generate_worker_id();
    tracing::info!(
        worker_id = %worker_id,
        queue = %config.queue_name,
        endpoint = %config.queue_endpoint,
        "starting impact assessment worker"
    );

    // Resolving the queue up front surfaces a missing queue or bad
    // credentials before the loop starts.
    let client = Arc::new(HttpQueueClient::connect(&config.queue_endpoint, &config.queue_name).await?);
    tracing::info!(queue_url = %client.queue_url(), "queue resolved");

    let registry = Arc::new(ProcessorRegistry::new());
    registry.register("spatial_overlay", NoopProcessor);
    registry.register("levy_calculation", NoopProcessor);
    tracing::info!(kinds = ?registry.kinds(), "registered job processors");

    let supervisor = Supervisor::new(config)?;
    let exit = supervisor
        .run(client, registry, Arc::new(HeuristicEstimator))
        .await?;

    std::process::exit(exit.code());
}
