use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

use finsent::config::Config;
use finsent::finbert_engine::{FinbertConfig, FinbertLoader};
use finsent::server::{AppState, router};
use finsent::{ClassifierService, SentimentPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,finsent=debug".into());
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("Starting sentiment server with config: {:?}", config);

    let service = Arc::new(ClassifierService::new(FinbertLoader::new(
        FinbertConfig::from(&config),
    )));

    if config.lazy_load {
        tracing::info!("Model will load on the first request");
    } else if let Err(err) = service.initialize().await {
        // The server keeps running so clients can see the failure on /health and /analyze.
        tracing::error!(error = %err, "Sentiment analysis is disabled");
    }

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = router(AppState::new(SentimentPipeline::new(service)))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;
    Ok(())
}
