//! Media task worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vtask_queue::RedisBroker;
use vtask_worker::{metrics, JobContext, JobExecutor, WorkerConfig};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vtask=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    // rustls needs an explicit provider for the Redis and HTTPS clients
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        error!("Failed to install rustls crypto provider");
        std::process::exit(1);
    }

    info!("Starting vtask-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!("Prometheus metrics listening on port {}", port),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let broker = match RedisBroker::from_env() {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to create task broker: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = broker.init().await {
        error!("Failed to initialise task broker: {}", e);
        std::process::exit(1);
    }

    let ctx = match JobContext::from_env(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to create job context: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, Arc::new(broker), ctx));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
