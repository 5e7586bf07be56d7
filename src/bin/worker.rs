use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use thermal_processing::{
    app_state::AppState,
    config::AppConfig,
    services::{api::ApiClient, storage::S3Storage},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting thermal processing worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus metrics exporter");
        tracing::info!(%addr, "Serving metrics");
    }

    metrics::describe_counter!(
        "recordings_processed_total",
        "Recordings that completed processing"
    );
    metrics::describe_counter!(
        "recordings_failed_total",
        "Recordings whose processing failed, by error kind"
    );
    metrics::describe_counter!("poll_iterations_total", "Poll loop iterations, by outcome");
    metrics::describe_histogram!(
        "recording_processing_seconds",
        "Time to process one recording end to end"
    );

    // Initialize services
    tracing::info!("Initializing services");
    let storage = S3Storage::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize storage client");

    let api = ApiClient::new(&config.api_url).expect("Failed to initialize API client");

    let state = AppState::new(storage, api);
    let poll_loop = state.poll_loop(&config);

    poll_loop
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!("Worker shutdown complete");
}
