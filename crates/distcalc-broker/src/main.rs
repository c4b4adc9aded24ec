use distcalc_broker::{Broker, BrokerConfig};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use axum::{extract::State, http::StatusCode, routing::get, Router};

#[derive(Parser, Debug)]
#[command(name = "dc-broker")]
#[command(about = "Distributed calculator broker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// REST API port
    #[arg(long)]
    port: Option<u16>,

    /// Metrics port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Simulated cost of an addition in milliseconds
    #[arg(long, env = "TIME_ADDITION_MS")]
    addition_ms: Option<u64>,

    /// Simulated cost of a subtraction in milliseconds
    #[arg(long, env = "TIME_SUBTRACTION_MS")]
    subtraction_ms: Option<u64>,

    /// Simulated cost of a multiplication in milliseconds
    #[arg(long, env = "TIME_MULTIPLICATIONS_MS")]
    multiplication_ms: Option<u64>,

    /// Simulated cost of a division in milliseconds
    #[arg(long, env = "TIME_DIVISIONS_MS")]
    division_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config_missing = !std::path::Path::new(&args.config).exists();
    let mut config = if config_missing {
        BrokerConfig::default()
    } else {
        BrokerConfig::from_file(&args.config)?
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.monitoring.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if config_missing {
        tracing::warn!("Config file {} not found, using defaults", args.config);
    }

    // Override with CLI args / environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(port) = args.metrics_port {
        config.monitoring.prometheus_port = port;
    }
    if let Some(ms) = args.addition_ms {
        config.operations.addition_ms = ms;
    }
    if let Some(ms) = args.subtraction_ms {
        config.operations.subtraction_ms = ms;
    }
    if let Some(ms) = args.multiplication_ms {
        config.operations.multiplication_ms = ms;
    }
    if let Some(ms) = args.division_ms {
        config.operations.division_ms = ms;
    }

    tracing::info!("Starting broker with config: {:?}", config);

    let broker = Arc::new(Broker::new(config.clone())?);

    let api = distcalc_broker::api::create_rest_api(broker.clone());
    let metrics = metrics_router(broker);

    tokio::try_join!(
        serve("REST API", config.rest_addr(), api),
        serve("Metrics", config.metrics_addr(), metrics),
    )?;

    Ok(())
}

/// `/metrics` in the Prometheus text format
fn metrics_router(broker: Arc<Broker>) -> Router {
    async fn scrape(State(broker): State<Arc<Broker>>) -> Result<String, StatusCode> {
        broker.metrics().encode().map_err(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }

    Router::new()
        .route("/metrics", get(scrape))
        .with_state(broker)
}

/// Serve `app` on `addr` until Ctrl-C.
async fn serve(label: &'static str, addr: String, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("{} listening on {}", label, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("{} received shutdown signal", label);
        })
        .await?;

    Ok(())
}
