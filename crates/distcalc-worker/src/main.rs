use distcalc_worker::{BrokerClient, Worker, WorkerConfig};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dc-worker")]
#[command(about = "Distributed calculator worker", long_about = None)]
struct Args {
    /// Broker base URL
    #[arg(short, long)]
    broker: Option<String>,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,

    /// Number of concurrent polling loops
    #[arg(short, long, env = "COMPUTING_POWER")]
    concurrency: Option<usize>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,
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
    let mut config = if let Some(config_path) = &args.config {
        WorkerConfig::from_file(config_path)?
    } else {
        WorkerConfig::default()
    };

    // Override with CLI args
    if let Some(broker) = args.broker {
        config.broker_url = broker;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(worker_id) = args.worker_id {
        config.worker_id = Some(worker_id);
    }

    let client = BrokerClient::new(
        &config.broker_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    tracing::info!("Polling broker at {}", config.broker_url);

    let worker = Worker::new(config, Arc::new(client));

    // Handle shutdown signals
    let signal_worker = worker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        signal_worker.shutdown();
    });

    worker.run().await
}
